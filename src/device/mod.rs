//! Device interaction module
//!
//! Android phones are reached through the Android Debug Bridge (adb).
//!
//! # Submodules
//!
//! - `traits` - The [`DeviceBridge`] abstraction and [`DeviceHandle`]
//! - `adb` - Subprocess-backed bridge implementation
//!
//! The USB media source only ever sees `dyn DeviceBridge`, so tests swap in
//! `testdb::MockBridge` without any other changes.

pub mod adb;
pub mod traits;

pub use adb::AdbBridge;
pub use traits::{find_device, DeviceBridge, DeviceHandle};
