use std::path::PathBuf;

use gdal::errors::GdalError;

use crate::Result;

/// Process wide GDAL settings, applied once before any dataset is opened
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub debug_logging: bool,
    pub proj_db_search_location: Option<PathBuf>,
    /// GDAL configuration options as key value pairs (e.g. `GDAL_HTTP_TIMEOUT`, `CPL_VSIL_CURL_ALLOWED_EXTENSIONS`)
    pub config_options: Vec<(String, String)>,
}

impl Config {
    pub fn apply(&self) -> Result<()> {
        setup_logging(self.debug_logging);

        if let Some(proj_db_path) = &self.proj_db_search_location {
            let proj_db_path = proj_db_path.to_string_lossy().to_string();
            if !proj_db_path.is_empty() {
                gdal::config::set_config_option("PROJ_DATA", proj_db_path.as_str())?;

                // Also set the environment variable unless it is already set by the user
                // e.g. Spatialite library does not use gdal settings
                if std::env::var_os("PROJ_DATA").is_none() {
                    unsafe { std::env::set_var("PROJ_DATA", proj_db_path.as_str()) };
                }
            }
        }

        for (key, value) in &self.config_options {
            log::debug!("GDAL config option {key}={value}");
            gdal::config::set_config_option(key, value)?;
        }

        Ok(())
    }
}

/// Routes the GDAL error handler output through the `log` crate
pub fn setup_logging(debug: bool) {
    if debug && gdal::config::set_config_option("CPL_DEBUG", "ON").is_err() {
        log::debug!("Failed to set GDAL debug level")
    }

    gdal::config::set_error_handler(|sev, _ec, msg| {
        use gdal::errors::CplErrType;
        match sev {
            CplErrType::Debug => log::debug!("GDAL: {msg}"),
            CplErrType::Warning => log::warn!("GDAL: {msg}"),
            CplErrType::Failure | CplErrType::Fatal => log::error!("GDAL: {msg}"),
            CplErrType::None => {}
        }
    });
}

/// OGR functions report failures with an `OGRErr` code instead of a `CPLErr`
pub fn check_ogr_rc(rc: gdal_sys::OGRErr::Type, method_name: &'static str) -> std::result::Result<(), GdalError> {
    if rc != gdal_sys::OGRErr::OGRERR_NONE {
        Err(GdalError::OgrError { err: rc, method_name })
    } else {
        Ok(())
    }
}

pub fn check_gdal_pointer<T>(ptr: *mut T, method_name: &'static str) -> std::result::Result<*mut T, GdalError> {
    if ptr.is_null() {
        let msg = last_error_message();
        unsafe { gdal_sys::CPLErrorReset() };
        Err(GdalError::NullPointer { method_name, msg })
    } else {
        Ok(ptr)
    }
}

fn last_error_message() -> String {
    let raw_ptr = unsafe { gdal_sys::CPLGetLastErrorMsg() };
    if raw_ptr.is_null() {
        return String::new();
    }

    unsafe { std::ffi::CStr::from_ptr(raw_ptr) }.to_string_lossy().into_owned()
}
