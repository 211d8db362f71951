//! Per-thread COM apartment management.

use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

use audio_stream_core::CaptureError;

/// Joins the MTA on construction, leaves it on drop if joining succeeded.
struct Apartment {
    joined: bool,
}

impl Apartment {
    fn enter() -> Self {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr.is_err() {
            log::warn!("CoInitializeEx failed on this thread: {:?}", hr);
        }
        Self { joined: hr.is_ok() }
    }
}

impl Drop for Apartment {
    fn drop(&mut self) {
        if self.joined {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

thread_local! {
    static APARTMENT: Apartment = Apartment::enter();
}

/// Make sure the calling thread is in the multithreaded apartment.
///
/// Sources are opened on the command thread and read on the capture thread,
/// so both call this before touching COM. A thread already in a
/// single-threaded apartment cannot join, and must not touch the source.
pub(crate) fn ensure_mta() -> Result<(), CaptureError> {
    if APARTMENT.with(|apartment| apartment.joined) {
        Ok(())
    } else {
        Err(CaptureError::InitFailed(
            "calling thread is in a single-threaded COM apartment".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use windows::Win32::System::Com::COINIT_APARTMENTTHREADED;

    use super::*;

    #[test]
    fn fresh_thread_joins_the_mta() {
        thread::spawn(|| assert!(ensure_mta().is_ok())).join().unwrap();
    }

    #[test]
    fn single_threaded_apartment_is_refused() {
        thread::spawn(|| {
            let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
            assert!(hr.is_ok());
            let err = ensure_mta().unwrap_err();
            assert!(matches!(err, CaptureError::InitFailed(_)));
            unsafe { CoUninitialize() };
        })
        .join()
        .unwrap();
    }
}
