//! Shared fixture for driving the compiled binary.
#![allow(dead_code)]

use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A source directory, an output directory and an explicit config file.
pub struct Workspace {
    root: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create workspace");
        fs::create_dir_all(root.path().join("images")).expect("create images dir");
        fs::create_dir_all(root.path().join("out")).expect("create out dir");
        let workspace = Self { root };
        workspace.write_config(&unreachable_url("/v1/chat/completions"), &unreachable_url(""));
        workspace
    }

    pub fn source(&self) -> PathBuf {
        self.root.path().join("images")
    }

    pub fn out(&self) -> PathBuf {
        self.root.path().join("out")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.path().join("config.json")
    }

    /// Create source files; contents are not valid images.
    pub fn add_images(&self, names: &[&str]) {
        for name in names {
            fs::write(self.source().join(name), b"not an image").expect("write image");
        }
    }

    pub fn write_config(&self, lm_url: &str, embed_url: &str) {
        let config = serde_json::json!({
            "schema_version": 1,
            "extensions": ["jpg", "jpeg", "png"],
            "checkpoint_every": 2,
            "embedding": { "endpoint": embed_url, "timeout_secs": 5 },
            "generator": {
                "endpoint": lm_url,
                "model": "test-model",
                "temperature": 0.0,
                "max_retries": 0,
                "timeout_secs": 5
            },
            "search": { "top_k": 3 }
        });
        let text = serde_json::to_string_pretty(&config).expect("serialize config");
        fs::write(self.config_path(), text).expect("write config");
    }

    /// Run the binary with collaborator env overrides cleared.
    pub fn run(&self, args: &[&str]) -> Output {
        self.run_with_env(args, &[])
    }

    pub fn run_with_env(&self, args: &[&str], vars: &[(&str, &str)]) -> Output {
        let mut command = Command::new(env!("CARGO_BIN_EXE_catalog-enrich"));
        command
            .args(args)
            .current_dir(self.root.path())
            .env_remove("CATALOG_ENRICH_LM_URL")
            .env_remove("CATALOG_ENRICH_EMBED_URL")
            .env("RUST_LOG", "warn");
        for (key, value) in vars {
            command.env(key, value);
        }
        command.output().expect("run catalog-enrich")
    }

    /// Seed the rolling checkpoint with one valid row per id.
    pub fn seed_checkpoint(&self, ids: &[&str]) {
        let mut text = String::from(CHECKPOINT_HEADER);
        for id in ids {
            text.push_str(&format!(
                "{id},red,v-neck,short sleeve,floral,cotton,relaxed fit,Red floral top,Soft cotton; Easy fit,A breezy floral top.,Relaxed and summery.,floral top; cotton top; summer\n"
            ));
        }
        fs::write(self.out().join("checkpoint_partial.csv"), text).expect("write checkpoint");
    }

    pub fn path_arg(path: &Path) -> String {
        path.display().to_string()
    }
}

pub const CHECKPOINT_HEADER: &str = "image,color,neckline,sleeve,pattern,fabric,fit,title,bullet_points,description,style_summary,seo_tags\n";

/// A loopback URL nothing is listening on.
pub fn unreachable_url(suffix: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback port");
    let addr = listener.local_addr().expect("loopback addr");
    drop(listener);
    format!("http://{addr}{suffix}")
}

pub fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}
