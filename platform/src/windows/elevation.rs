use disktopo_core::Privilege;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY};
use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

/// Privilege level of the current process, read from its token.
///
/// A token that cannot be queried counts as standard privileges.
pub fn process_privilege() -> Privilege {
    match token_is_elevated() {
        Ok(elevated) => Privilege::from(elevated),
        Err(e) => {
            log::warn!("Cannot query the process token ({}), assuming standard privileges", e);
            Privilege::Standard
        }
    }
}

fn token_is_elevated() -> windows::core::Result<bool> {
    let mut token = HANDLE::default();
    let mut elevation = TOKEN_ELEVATION { TokenIsElevated: 0 };
    let mut returned = 0u32;

    unsafe {
        OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token)?;
        let queried = GetTokenInformation(
            token,
            TokenElevation,
            Some(&mut elevation as *mut TOKEN_ELEVATION as *mut _),
            std::mem::size_of::<TOKEN_ELEVATION>() as u32,
            &mut returned,
        );
        let _ = CloseHandle(token);
        queried?;
    }

    Ok(elevation.TokenIsElevated != 0)
}
