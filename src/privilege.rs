use crate::source::SourceError;

/// Answers whether the current process may run elevated-only queries.
pub trait PrivilegeCheck {
    fn is_elevated(&self) -> Result<bool, SourceError>;
}

/// Reads the elevation flag of the current process token.
pub struct ProcessToken;

impl PrivilegeCheck for ProcessToken {
    #[cfg(windows)]
    fn is_elevated(&self) -> Result<bool, SourceError> {
        use std::ffi::c_void;
        use windows::Win32::Foundation::{CloseHandle, HANDLE};
        use windows::Win32::Security::{
            GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY,
        };
        use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

        let mut token = HANDLE::default();
        unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) }
            .map_err(|e| SourceError::caused_by("opening process token", e))?;

        let mut elevation = TOKEN_ELEVATION::default();
        let mut returned = 0u32;
        let res = unsafe {
            GetTokenInformation(
                token,
                TokenElevation,
                Some(&mut elevation as *mut TOKEN_ELEVATION as *mut c_void),
                std::mem::size_of::<TOKEN_ELEVATION>() as u32,
                &mut returned,
            )
        };
        unsafe {
            let _ = CloseHandle(token);
        }
        res.map_err(|e| SourceError::caused_by("querying token elevation", e))?;
        Ok(elevation.TokenIsElevated != 0)
    }

    #[cfg(not(windows))]
    fn is_elevated(&self) -> Result<bool, SourceError> {
        Err(SourceError::new("no process token off Windows"))
    }
}
