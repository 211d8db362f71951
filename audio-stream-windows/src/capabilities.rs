//! OS capability probe.
//!
//! Event-driven loopback capture on a render endpoint needs Windows 10 1703
//! (build 15063) or later; earlier builds never signal the capture event.

use windows::Wdk::System::SystemServices::RtlGetVersion;
use windows::Win32::System::SystemInformation::OSVERSIONINFOW;

/// First build with working event-driven loopback.
pub const LOOPBACK_MIN_BUILD: u32 = 15063;

/// The real OS build number (unaffected by compatibility shims).
pub fn os_build_number() -> Option<u32> {
    let mut info = OSVERSIONINFOW {
        dwOSVersionInfoSize: std::mem::size_of::<OSVERSIONINFOW>() as u32,
        ..Default::default()
    };
    let status = unsafe { RtlGetVersion(&mut info) };
    if status.is_ok() {
        Some(info.dwBuildNumber)
    } else {
        log::warn!("RtlGetVersion failed: {:?}", status);
        None
    }
}

pub fn loopback_supported() -> bool {
    match os_build_number() {
        Some(build) => build >= LOOPBACK_MIN_BUILD,
        None => false,
    }
}
