//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." (every developer at 3am) 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! 🧠 Knowledge graph:
//! - `OutputConfig`: every option the formatter understands. Names match the classic
//!   Elasticsearch output plugin options one-to-one (`index`, `type`, `logstash_format`, ...).
//! - `EndpointConfig`: where the CLI sender POSTs. The formatting core never reads it.
//! - Defaults live in `default_*` fns, same as the rest of the family.

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// 📦 The AppConfig: one struct to rule them all.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// 🎨 How documents get shaped.
    #[serde(default)]
    pub output: OutputConfig,
    /// 📡 Where they get sent. Optional because `esx format` never leaves the process.
    #[serde(default)]
    pub endpoint: Option<EndpointConfig>,
}

/// 🎨 The formatter's options. Immutable once a `BulkFormatter` is built from it.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// 🗂️ Index name, strftime patterns welcome (`logs-%Y.%m.%d`).
    #[serde(default = "default_index")]
    pub index: String,
    /// 🏷️ `_type` for Elasticsearch <= 6.x. Ignored when `suppress_type_name` is on.
    #[serde(rename = "type", default = "default_doc_type")]
    pub doc_type: String,
    #[serde(default)]
    pub suppress_type_name: bool,
    /// 📅 `<prefix>-<date>` index names, logstash style.
    #[serde(default)]
    pub logstash_format: bool,
    #[serde(default = "default_logstash_prefix")]
    pub logstash_prefix: String,
    /// 🔍 Record accessor whose value replaces `logstash_prefix` when present.
    #[serde(default)]
    pub logstash_prefix_key: Option<String>,
    #[serde(default = "default_logstash_dateformat")]
    pub logstash_dateformat: String,
    /// ⏰ Name of the timestamp field prepended to every document.
    #[serde(default = "default_time_key")]
    pub time_key: String,
    #[serde(default = "default_time_key_format")]
    pub time_key_format: String,
    /// 🔬 Nine fractional digits instead of three.
    #[serde(default)]
    pub time_key_nanos: bool,
    #[serde(default)]
    pub include_tag_key: bool,
    #[serde(default = "default_tag_key")]
    pub tag_key: String,
    /// 🪪 Hash-based `_id`s. Takes precedence over `id_format`.
    #[serde(default)]
    pub generate_id: bool,
    /// 🧼 `a.b` → `a_b` in every key, all the way down.
    #[serde(default)]
    pub replace_dots: bool,
    /// 🧩 `_id` template, e.g. `$[host]-$[request_id]`. First-level string fields only.
    #[serde(default)]
    pub id_format: Option<String>,
    /// ⏰ Use the wall clock instead of record time for index names (and the time key).
    #[serde(default)]
    pub current_time_index: bool,
    /// 🖨️ Log every formatted payload.
    #[serde(default)]
    pub trace_output: bool,
    /// 🖨️ Log request and response when the cluster reports errors.
    #[serde(default)]
    pub trace_error: bool,
}

fn default_index() -> String {
    "fluent-bit".to_string()
}

// 🏷️ "_doc": the type that survived the great type purge of Elasticsearch 7
fn default_doc_type() -> String {
    "_doc".to_string()
}

fn default_logstash_prefix() -> String {
    "logstash".to_string()
}

fn default_logstash_dateformat() -> String {
    "%Y.%m.%d".to_string()
}

fn default_time_key() -> String {
    "@timestamp".to_string()
}

fn default_time_key_format() -> String {
    "%Y-%m-%dT%H:%M:%S".to_string()
}

fn default_tag_key() -> String {
    "flb-key".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            index: default_index(),
            doc_type: default_doc_type(),
            suppress_type_name: false,
            logstash_format: false,
            logstash_prefix: default_logstash_prefix(),
            logstash_prefix_key: None,
            logstash_dateformat: default_logstash_dateformat(),
            time_key: default_time_key(),
            time_key_format: default_time_key_format(),
            time_key_nanos: false,
            include_tag_key: false,
            tag_key: default_tag_key(),
            generate_id: false,
            replace_dots: false,
            id_format: None,
            current_time_index: false,
            trace_output: false,
            trace_error: false,
        }
    }
}

/// 📡 Where the bulk payload goes. Only the CLI sender looks at this.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// 📡 Base URL, e.g. `http://127.0.0.1:9200`.
    pub url: String,
    /// 🛣️ Path prefix when the cluster hides behind a reverse proxy.
    #[serde(default)]
    pub path: Option<String>,
    /// 🚰 Ingest pipeline to run documents through.
    #[serde(default)]
    pub pipeline: Option<String>,
    /// 🔒 Basic auth. "password123" is not a password. It is a confession.
    #[serde(default)]
    pub http_user: Option<String>,
    #[serde(default)]
    pub http_passwd: Option<String>,
}

impl EndpointConfig {
    /// 🛣️ `{path}/_bulk`, or `{path}/_bulk/?pipeline={pipeline}` when a pipeline is set.
    pub fn bulk_path(&self) -> String {
        let path = self.path.as_deref().unwrap_or("").trim_end_matches('/');
        match &self.pipeline {
            Some(pipeline) => format!("{path}/_bulk/?pipeline={pipeline}"),
            None => format!("{path}/_bulk"),
        }
    }

    /// 📡 Base URL + bulk path, with exactly one slash in between.
    pub fn bulk_url(&self) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), self.bulk_path())
    }
}

/// 🚀 Load the config: from a file, from env vars, or from the sheer power of hoping.
///
/// 🔧 Merges environment variables (ESX_*) with an optional TOML file.
///   - `config_file_name` None → env vars only.
///   - `config_file_name` Some → env vars + TOML file, merged. TOML wins on conflicts.
///
/// 💀 Returns an error if config is unparseable, with a message that says where we looked.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("ESX_"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (ESX_*). \
             The file exists in our hearts, but apparently not on disk.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (ESX_*). \
                 No file was provided, this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_test_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("💀 Failed to create temp config. The filesystem said 'new phone who dis'.");
        file.write_all(contents.as_bytes())
            .expect("💀 Failed to write test config.");
        file
    }

    #[test]
    fn the_one_where_every_option_finds_its_field() {
        let the_file = write_test_config(
            r#"
            [output]
            index = "app-%Y"
            type = "flb_type"
            suppress_type_name = true
            logstash_format = true
            logstash_prefix = "app"
            logstash_prefix_key = "$kubernetes['namespace']"
            logstash_dateformat = "%Y.%m"
            time_key = "ts"
            time_key_format = "%s"
            time_key_nanos = true
            include_tag_key = true
            tag_key = "_tag"
            generate_id = true
            replace_dots = true
            id_format = "$[host]"
            current_time_index = true
            trace_output = true
            trace_error = true

            [endpoint]
            url = "http://localhost:9200"
            pipeline = "geoip"
            "#,
        );

        let the_config = load_config(Some(the_file.path()))
            .expect("💀 Full config should parse. The schema drift goblin does not get this win.");
        let the_output = the_config.output;
        assert_eq!(the_output.index, "app-%Y");
        assert_eq!(the_output.doc_type, "flb_type");
        assert!(the_output.suppress_type_name);
        assert!(the_output.logstash_format);
        assert_eq!(the_output.logstash_prefix, "app");
        assert_eq!(
            the_output.logstash_prefix_key.as_deref(),
            Some("$kubernetes['namespace']")
        );
        assert_eq!(the_output.logstash_dateformat, "%Y.%m");
        assert_eq!(the_output.time_key, "ts");
        assert_eq!(the_output.time_key_format, "%s");
        assert!(the_output.time_key_nanos);
        assert!(the_output.include_tag_key);
        assert_eq!(the_output.tag_key, "_tag");
        assert!(the_output.generate_id);
        assert!(the_output.replace_dots);
        assert_eq!(the_output.id_format.as_deref(), Some("$[host]"));
        assert!(the_output.current_time_index);
        assert!(the_output.trace_output);
        assert!(the_output.trace_error);

        let the_endpoint = the_config.endpoint.expect("endpoint table was provided");
        assert_eq!(the_endpoint.bulk_url(), "http://localhost:9200/_bulk/?pipeline=geoip");
    }

    #[test]
    fn the_one_where_defaults_show_up_uninvited_but_helpful() {
        let the_config: AppConfig =
            toml::from_str("").expect("💀 An empty config should lean entirely on defaults.");
        assert_eq!(the_config.output, OutputConfig::default());
        assert_eq!(the_config.output.index, "fluent-bit");
        assert_eq!(the_config.output.doc_type, "_doc");
        assert_eq!(the_config.output.logstash_prefix, "logstash");
        assert_eq!(the_config.output.logstash_dateformat, "%Y.%m.%d");
        assert_eq!(the_config.output.time_key, "@timestamp");
        assert_eq!(the_config.output.time_key_format, "%Y-%m-%dT%H:%M:%S");
        assert_eq!(the_config.output.tag_key, "flb-key");
        assert!(the_config.endpoint.is_none());
    }

    #[test]
    fn the_one_where_the_proxy_path_gets_exactly_one_slash() {
        let the_endpoint = EndpointConfig {
            url: "https://es.internal/".into(),
            path: Some("/search/".into()),
            pipeline: None,
            http_user: None,
            http_passwd: None,
        };
        assert_eq!(the_endpoint.bulk_path(), "/search/_bulk");
        assert_eq!(the_endpoint.bulk_url(), "https://es.internal/search/_bulk");
    }
}
