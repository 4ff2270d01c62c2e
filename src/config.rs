use serde::Deserialize;

use crate::error::{Error, Result};
use crate::replacer::ReplacerPolicy;

#[derive(Debug, PartialEq, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
    /// Replacement policy used when the buffer pool is full.
    pub policy: ReplacerPolicy,
    /// Number of frames in the buffer pool, also bounds each ghost list.
    pub num_frames: usize,
    /// History depth of the LRU-K policy. Ignored by ARC.
    pub replacer_k: usize,
}

impl Config {
    pub fn new(file: &str) -> Result<Config> {
        let mut cfg = config::Config::builder()
            .set_default("policy", "lruk")?
            .set_default("log_level", "debug")?
            .set_default("num_frames", 64)?
            .set_default("replacer_k", 2)?;
        if !file.is_empty() {
            cfg = cfg.add_source(config::File::with_name(file))
        }
        cfg = cfg.add_source(config::Environment::with_prefix("EVICTKIT"));
        let config: Config = cfg.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.num_frames == 0 {
            return Err(Error::value("num_frames should be larger than zero"));
        }
        if self.replacer_k == 0 {
            return Err(Error::value("replacer_k should be larger than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() -> Result<()> {
        let cfg = Config::new("")?;
        assert_eq!(LogLevel::Debug, cfg.log_level);
        assert_eq!(ReplacerPolicy::LruK, cfg.policy);
        assert_eq!(64, cfg.num_frames);
        assert_eq!(2, cfg.replacer_k);
        Ok(())
    }
}
