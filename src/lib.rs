//! **hyprexpose** — an exposé-style window overview.
//!
//! Opening an overview zooms out from the focused window to a grid of every
//! window on the monitor.  Clicking a tile (or swiping back) zooms into it
//! and focuses its window.
//!
//! # Architecture
//!
//! The crate is organised around explicit host contracts:
//!
//! * [`traits::Compositor`] and [`traits::Renderer`] — everything the
//!   overview needs from the compositor: window enumeration, focus, input
//!   hooks, damage, off-screen framebuffers and the "render window into
//!   framebuffer" primitive.  Nothing reaches into compositor internals.
//! * [`traits::CommandSource`] — abstracts the transport that delivers
//!   user intent (a Unix socket, Hyprland's swipe events, …).
//!
//! [`session::OverviewSession`] is the state machine for one open overview,
//! built from [`grid`], [`framebuffer`], [`animation`] and [`hit_test`].
//! [`manager::OverviewManager`] owns at most one session and routes host
//! callbacks to it.  [`backend::headless`] is an in-memory host used by the
//! daemon and the tests.

pub mod animation;
pub mod backend;
pub mod bezier;
pub mod command;
pub mod config;
pub mod framebuffer;
pub mod gestures;
pub mod grid;
pub mod hit_test;
pub mod ipc;
pub mod manager;
pub mod session;
pub mod traits;
