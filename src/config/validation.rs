use crate::config::types::{
    Config, DispatcherConfig, DrainConfig, FeedConfig, MediaConfig, OutputConfig, WorkerConfig,
};
use crate::pipeline::WindowPolicy;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    WindowPolicy::from_config(&config.window)?;
    validate_feed_config(&config.feed)?;
    validate_media_config(&config.media)?;
    validate_worker_config(&config.workers)?;
    validate_dispatcher_config(&config.dispatcher)?;
    validate_drain_config(&config.drain)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates feed configuration
fn validate_feed_config(config: &FeedConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid feed endpoint: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Feed endpoint '{}' must use HTTP or HTTPS",
            config.endpoint
        )));
    }

    if config.cursor_param.is_empty() {
        return Err(ConfigError::Validation(
            "cursor-param cannot be empty".to_string(),
        ));
    }

    if config.transcript_keyword.trim().is_empty() {
        return Err(ConfigError::Validation(
            "transcript-keyword cannot be empty".to_string(),
        ));
    }

    if config.growth_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "growth-attempts must be >= 1, got {}",
            config.growth_attempts
        )));
    }

    if config.access_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "access-retries must be >= 1, got {}",
            config.access_retries
        )));
    }

    Ok(())
}

/// Validates media selection
fn validate_media_config(config: &MediaConfig) -> Result<(), ConfigError> {
    if !config.images && !config.videos && !config.animated {
        return Err(ConfigError::Validation(
            "at least one of images, videos or animated must be enabled".to_string(),
        ));
    }

    if config.exclude_patterns.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::Validation(
            "exclude-patterns cannot contain empty strings".to_string(),
        ));
    }

    if let Some(query) = &config.image_query {
        if query.is_empty() || query.starts_with('?') {
            return Err(ConfigError::Validation(format!(
                "image-query must be a bare query string, got '{}'",
                query
            )));
        }
    }

    Ok(())
}

/// Validates worker pool configuration
fn validate_worker_config(config: &WorkerConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("image-concurrency", config.image_concurrency),
        ("video-concurrency", config.video_concurrency),
    ] {
        if !(1..=100).contains(&value) {
            return Err(ConfigError::Validation(format!(
                "{} must be between 1 and 100, got {}",
                name, value
            )));
        }
    }

    for (name, value) in [
        ("image-timeout-secs", config.image_timeout_secs),
        ("video-timeout-secs", config.video_timeout_secs),
    ] {
        if value < 1 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 1, got {}",
                name, value
            )));
        }
    }

    if config.max_pending < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pending must be >= 1, got {}",
            config.max_pending
        )));
    }

    Ok(())
}

/// Validates dispatcher configuration
fn validate_dispatcher_config(config: &DispatcherConfig) -> Result<(), ConfigError> {
    if config.pop_timeout_ms < 10 {
        return Err(ConfigError::Validation(format!(
            "pop-timeout-ms must be >= 10ms, got {}ms",
            config.pop_timeout_ms
        )));
    }

    if config.max_idle_polls < 1 {
        return Err(ConfigError::Validation(format!(
            "max-idle-polls must be >= 1, got {}",
            config.max_idle_polls
        )));
    }

    if config.backpressure_poll_ms < 1 {
        return Err(ConfigError::Validation(
            "backpressure-poll-ms must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates drain timing
fn validate_drain_config(config: &DrainConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 || config.grace_secs < 1 || config.worker_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "drain timeouts must all be >= 1 second".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    for (name, value) in [
        ("video-subdir", &config.video_subdir),
        ("transcript-name", &config.transcript_name),
        ("manifest-name", &config.manifest_name),
    ] {
        validate_path_component(name, value)?;
    }

    if config.transcript_name == config.manifest_name {
        return Err(ConfigError::Validation(
            "transcript-name and manifest-name must differ".to_string(),
        ));
    }

    Ok(())
}

/// A single relative path component: non-empty, no separators, no `..`
fn validate_path_component(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(ConfigError::Validation(format!(
            "{} must be a plain file or directory name, got '{}'",
            name, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(images: bool, videos: bool, animated: bool) -> MediaConfig {
        MediaConfig {
            images,
            videos,
            animated,
            ..MediaConfig::default()
        }
    }

    #[test]
    fn test_validate_media_config() {
        assert!(validate_media_config(&media(true, false, false)).is_ok());
        assert!(validate_media_config(&media(false, false, true)).is_ok());
        assert!(validate_media_config(&media(false, false, false)).is_err());

        let mut bad_query = MediaConfig::default();
        bad_query.image_query = Some("?format=png".to_string());
        assert!(validate_media_config(&bad_query).is_err());
    }

    #[test]
    fn test_validate_worker_config() {
        assert!(validate_worker_config(&WorkerConfig::default()).is_ok());

        let mut zero = WorkerConfig::default();
        zero.video_concurrency = 0;
        assert!(validate_worker_config(&zero).is_err());

        let mut huge = WorkerConfig::default();
        huge.image_concurrency = 101;
        assert!(validate_worker_config(&huge).is_err());

        let mut no_timeout = WorkerConfig::default();
        no_timeout.image_timeout_secs = 0;
        assert!(validate_worker_config(&no_timeout).is_err());
    }

    #[test]
    fn test_validate_path_component() {
        assert!(validate_path_component("video-subdir", "video").is_ok());
        assert!(validate_path_component("video-subdir", "video & gif").is_ok());

        assert!(validate_path_component("video-subdir", "").is_err());
        assert!(validate_path_component("video-subdir", "..").is_err());
        assert!(validate_path_component("video-subdir", "a/b").is_err());
    }
}
