//! `list` subcommand.

use jarcrawler_core::{Config, SourceId};

/// One line per source: name, kind, enabled flag and endpoint.
pub(crate) fn render_source_list(config: &Config) -> String {
    let mut out = String::new();
    for id in SourceId::ALL {
        let state = if config.sources.is_enabled(id) {
            "enabled"
        } else {
            "disabled"
        };
        out.push_str(&format!(
            "{:<8} {:<22} {:<8} {}\n",
            id.as_str(),
            id.kind(),
            state,
            config.sources.endpoint(id)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_shows_every_source() {
        let mut config = Config::default();
        config.sources.sponge.enabled = false;
        let rendered = render_source_list(&config);
        assert_eq!(rendered.lines().count(), 6);
        let sponge = rendered.lines().find(|l| l.starts_with("sponge")).unwrap();
        assert!(sponge.contains("disabled"));
        assert!(sponge.contains("tag-filtered registry"));
        assert!(rendered.contains("https://files.mcjars.app/spigot/"));
        assert!(rendered.contains("installer index"));
    }
}
