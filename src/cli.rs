use clap::Parser;
use std::path::PathBuf;

use crate::api::ObjectQuery;

/// Ranked video-frame review client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Free-text search description
    #[arg(value_name = "QUERY")]
    pub query: Option<String>,

    /// Retrieval server base URL
    #[arg(short = 's', long = "server", value_name = "URL", default_value = "http://localhost:5000")]
    pub server: String,

    /// Audio transcript query
    #[arg(short = 'a', long = "audio", value_name = "TEXT", default_value = "")]
    pub audio: String,

    /// Object filter LABEL[:CONF[:MIN[:MAX]]] (can be specified multiple times)
    #[arg(short = 'O', long = "object", value_name = "FILTER")]
    pub objects: Vec<String>,

    /// Log in to the evaluation server and store the session
    #[arg(long = "login")]
    pub login: bool,

    /// Submit the search result at INDEX (0-based) to the evaluation server
    #[arg(long = "submit", value_name = "INDEX")]
    pub submit: Option<usize>,

    /// Run the scripted playback demo on the simulated runtime
    #[arg(long = "demo")]
    pub demo: bool,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

/// Parse an `--object` filter: `LABEL[:CONF[:MIN[:MAX]]]`.
/// Defaults: confidence 0.5, at least 1 instance, no upper bound.
pub fn parse_object_filter(spec: &str) -> Result<ObjectQuery, String> {
    let mut parts = spec.split(':');
    let label = parts
        .next()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| format!("empty object filter: {spec:?}"))?;

    let confidence = match parts.next() {
        Some(c) => c
            .parse::<f64>()
            .map_err(|_| format!("bad confidence in {spec:?}"))?,
        None => 0.5,
    };
    let min_instances = match parts.next() {
        Some(m) => m
            .parse::<u32>()
            .map_err(|_| format!("bad min count in {spec:?}"))?,
        None => 1,
    };
    let max_instances = match parts.next() {
        Some(m) => Some(
            m.parse::<u32>()
                .map_err(|_| format!("bad max count in {spec:?}"))?,
        ),
        None => None,
    };
    if !(0.0..=1.0).contains(&confidence) {
        return Err(format!("confidence out of range in {spec:?}"));
    }

    Ok(ObjectQuery {
        label: label.to_string(),
        confidence,
        min_instances,
        max_instances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label_only() {
        let q = parse_object_filter("car").unwrap();
        assert_eq!(q.label, "car");
        assert_eq!(q.confidence, 0.5);
        assert_eq!(q.min_instances, 1);
        assert_eq!(q.max_instances, None);
    }

    #[test]
    fn test_parse_full_spec() {
        let q = parse_object_filter("dog:0.8:2:5").unwrap();
        assert_eq!(q.label, "dog");
        assert_eq!(q.confidence, 0.8);
        assert_eq!(q.min_instances, 2);
        assert_eq!(q.max_instances, Some(5));
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(parse_object_filter("").is_err());
        assert!(parse_object_filter("car:high").is_err());
        assert!(parse_object_filter("car:1.5").is_err());
        assert!(parse_object_filter("car:0.5:many").is_err());
    }
}
