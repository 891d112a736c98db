//! Routing configuration for the hosting platform: requests for a chunked
//! file go to the reconstructor, requests under the chunk namespace are
//! served statically.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chunkcdn_common::Manifest;
use log::warn;
use serde::Serialize;

pub const DEFAULT_ROUTES_FILE_NAME: &str = "app.yaml";

#[derive(Debug, Clone)]
pub struct RouteOptions {
    pub application: Option<String>,
    pub default_expiration: String,
    /// Handler name the platform dispatches reconstructor requests to.
    pub reconstructor_script: String,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            application: None,
            default_expiration: "30d".to_string(),
            reconstructor_script: "_go_app".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    pub default_expiration: String,
    pub handlers: Vec<Handler>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handler {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,
}

/// Build the route table from the manifest's key set. Nested keys cannot be
/// served by the reconstructor and are left out.
pub fn build_routes(manifest: &Manifest, namespace: &str, options: &RouteOptions) -> RouteConfig {
    let namespace = namespace.trim_matches('/');
    let mut handlers: Vec<Handler> = manifest
        .keys()
        .filter(|key| {
            let routable = !key.contains('/');
            if !routable {
                warn!("no route for nested key {key}");
            }
            routable
        })
        .map(|key| Handler {
            url: format!("/{key}"),
            script: Some(options.reconstructor_script.clone()),
            static_dir: None,
        })
        .collect();

    handlers.push(Handler {
        url: format!("/{namespace}/*"),
        script: None,
        static_dir: Some(namespace.to_string()),
    });

    RouteConfig {
        application: options.application.clone(),
        default_expiration: options.default_expiration.clone(),
        handlers,
    }
}

pub fn render_routes(config: &RouteConfig) -> Result<String> {
    serde_yaml::to_string(config).context("rendering route config")
}

pub fn write_routes(path: &Path, manifest: &Manifest, namespace: &str, options: &RouteOptions) -> Result<()> {
    let config = build_routes(manifest, namespace, options);
    let text = render_routes(&config)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    log::info!("wrote {} ({} handlers)", path.display(), config.handlers.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(keys: &[&str]) -> Manifest {
        let mut m = Manifest::new();
        for k in keys {
            m.insert(*k, Vec::new());
        }
        m
    }

    #[test]
    fn test_routes_for_each_key_then_static_namespace() {
        let config = build_routes(&manifest(&["video.mp4", "big.iso"]), "chunk", &RouteOptions::default());
        let urls: Vec<_> = config.handlers.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(urls, ["/big.iso", "/video.mp4", "/chunk/*"]);

        let last = config.handlers.last().unwrap();
        assert_eq!(last.static_dir.as_deref(), Some("chunk"));
        assert!(last.script.is_none());
        assert_eq!(config.handlers[0].script.as_deref(), Some("_go_app"));
    }

    #[test]
    fn test_nested_keys_get_no_route() {
        let config = build_routes(&manifest(&["a/b.bin", "c.bin"]), "/chunk/", &RouteOptions::default());
        let urls: Vec<_> = config.handlers.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(urls, ["/c.bin", "/chunk/*"]);
    }

    #[test]
    fn test_render_yaml() {
        let options = RouteOptions {
            application: Some("sinuous-vortex-700".into()),
            ..RouteOptions::default()
        };
        let text = render_routes(&build_routes(&manifest(&["video.mp4"]), "chunk", &options)).unwrap();

        assert!(text.contains("application: sinuous-vortex-700"), "{text}");
        assert!(text.contains("default_expiration: 30d"), "{text}");
        assert!(text.contains("url: /video.mp4"), "{text}");
        assert!(text.contains("static_dir: chunk"), "{text}");
        assert!(!text.contains("static_dir: null"), "{text}");
    }
}
