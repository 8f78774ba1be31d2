//! Chirp Core - hand-off and math primitives for real-time synthesis
//!
//! This crate holds the pieces of chirp that every execution context shares:
//! the lock-free single-producer/single-consumer [`CircularBuffer`] used to move
//! commands and voices between threads, and the allocation-free math helpers
//! used on the audio path.
//!
//! # Core Abstractions
//!
//! ## Lock-Free Hand-Off
//!
//! - [`CircularBuffer`] - Fixed-capacity SPSC FIFO, never blocks, never allocates
//!   after construction
//! - [`Producer`] / [`Consumer`] - The two non-cloneable ends produced by
//!   [`CircularBuffer::split`]
//!
//! The workspace denies `unsafe_code`. The circular buffer module is the one
//! exception: its slots are `UnsafeCell`s handed between the two ends under
//! acquire/release ordering.
//!
//! ```rust
//! use chirp_core::CircularBuffer;
//!
//! let buffer = CircularBuffer::<u32>::new(8).unwrap();
//! let (mut tx, mut rx) = buffer.split();
//!
//! assert!(tx.try_push(1).is_ok());
//! assert!(tx.try_push(2).is_ok());
//!
//! let mut out = 0;
//! assert!(rx.try_pop(&mut out));
//! assert_eq!(out, 1);
//! ```
//!
//! ## Math
//!
//! - [`approx_sin_taylor`] - Odd Taylor polynomial with quadrant folding
//! - [`approx_sin_quad`] / [`approx_sin_cubic`] - Cheap polynomial shapes
//! - [`EPSILON`] - Amplitude floor shared by envelopes and voices
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible (it needs `alloc`). Disable the default
//! `std` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! chirp-core = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod circular;
pub mod error;
pub mod math;

pub use circular::{CircularBuffer, Consumer, Producer};
pub use error::CoreError;
pub use math::{EPSILON, approx_sin_cubic, approx_sin_quad, approx_sin_taylor, rem_euclid};
