//! Host implementations.
//!
//! This module provides concrete backends for the
//! [`Compositor`](crate::traits::Compositor) and
//! [`Renderer`](crate::traits::Renderer) traits.
//!
//! Only the in-memory [`headless`] host ships with the crate; a compositor
//! plugin embeds the session against its own implementation of the traits.

pub mod headless;
