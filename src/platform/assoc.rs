// ETWSpy - platform/assoc.rs
//
// Best-effort registration of the .etwspy file association under
// HKCU\Software\Classes so double-clicking a config opens it here.
// Per-user only; no elevation needed. Failures are logged and ignored.

/// Register (or refresh) the `.etwspy` association for the current user.
#[cfg(windows)]
pub fn register_file_association() {
    if let Err(e) = register() {
        tracing::debug!(error = %e, "File association registration failed");
    }
}

#[cfg(windows)]
fn register() -> std::io::Result<()> {
    use crate::util::constants::{APP_ID, CONFIG_EXTENSION};
    use winreg::enums::HKEY_CURRENT_USER;
    use winreg::RegKey;

    let exe = std::env::current_exe()?;
    let exe = exe.to_string_lossy();
    let prog_id = format!("{APP_ID}.Config");

    let hkcu = RegKey::predef(HKEY_CURRENT_USER);

    let (ext_key, _) =
        hkcu.create_subkey(format!(r"Software\Classes\.{CONFIG_EXTENSION}"))?;
    ext_key.set_value("", &prog_id.as_str())?;

    let (class_key, _) = hkcu.create_subkey(format!(r"Software\Classes\{prog_id}"))?;
    class_key.set_value("", &format!("{APP_ID} Configuration"))?;

    let (icon_key, _) =
        hkcu.create_subkey(format!(r"Software\Classes\{prog_id}\DefaultIcon"))?;
    icon_key.set_value("", &format!("\"{exe}\",0"))?;

    let (open_key, _) =
        hkcu.create_subkey(format!(r"Software\Classes\{prog_id}\shell\open\command"))?;
    open_key.set_value("", &format!("\"{exe}\" \"%1\""))?;

    tracing::debug!("File association registered");
    Ok(())
}

#[cfg(not(windows))]
pub fn register_file_association() {}
