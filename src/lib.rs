//! # upi-qr
//!
//! An HTTP service that turns UPI payment requests into styled QR code images.
//!
//! The crate carries its own QR Code Model 2 encoder: versions 1 to 40, four error correction
//! levels, byte-mode payloads, Reed–Solomon error correction and penalty-based mask selection.
//! On top of it sit a renderer with six module styles and a decorative border, and an axum
//! router exposing `/api/qr`.
//!
//! ## Example
//!
//! Encode a payment URI and render it to PNG bytes:
//!
//! ```rust
//! use upi_qr::helper::{render_png, RenderOptions};
//! use upi_qr::qrcode::{encode, QrCodeEcc};
//! use upi_qr::upi::PaymentRequest;
//!
//! let request = PaymentRequest::new("satyam84ya@fam", "Test", "INR", Some("100")).unwrap();
//! let qr = encode(&request.to_uri(), QrCodeEcc::High, None).unwrap();
//! assert_eq!(qr.size(), 41);
//!
//! let png = render_png(&qr, &RenderOptions::default()).unwrap();
//! assert!(png.starts_with(b"\x89PNG"));
//! ```
//!
//! ## Modules
//!
//! - [`qrcode`]: Symbol encoding.
//! - [`helper`]: Rasterizing symbols into styled images.
//! - [`upi`]: Payment requests and their URIs.
//! - [`server`]: The HTTP router.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod helper;
pub mod qrcode;
pub mod server;
pub mod upi;
