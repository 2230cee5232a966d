use crate::Result;
use bon::bon;
use inf::gdalinterop;

/// GDAL settings for the process, apply before reading or writing through the GDAL backend
pub struct RuntimeConfiguration {
    gdal_config: gdalinterop::Config,
}

#[bon]
impl RuntimeConfiguration {
    #[builder]
    pub fn new(proj_db: Option<&std::path::Path>, gdal_debug_log: Option<bool>, config_options: Option<Vec<(String, String)>>) -> Self {
        Self {
            gdal_config: gdalinterop::Config {
                debug_logging: gdal_debug_log.unwrap_or(false),
                proj_db_search_location: proj_db.map(std::path::Path::to_path_buf),
                config_options: config_options.unwrap_or_default(),
            },
        }
    }

    pub fn apply(&self) -> Result<()> {
        self.gdal_config.apply()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_config_options() -> Result<()> {
        RuntimeConfiguration::builder()
            .config_options(vec![("GDAL_HTTP_TIMEOUT".to_string(), "30".to_string())])
            .build()
            .apply()?;

        assert_eq!(gdal::config::get_config_option("GDAL_HTTP_TIMEOUT", "")?, "30");
        Ok(())
    }
}
