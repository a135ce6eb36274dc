//! Deployment fixtures for archive replay integration tests.
//!
//! A [`Deployment`] is a temporary directory holding an outputs document the
//! way the provisioning step leaves it, nested a few levels deep.

use serde_json::json;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const ACCOUNT: &str = "000000000000";
pub const REGION: &str = "us-east-1";
pub const STACK_NAME: &str = "InfraStack";
pub const BUS_NAME: &str = "replay-bus";
pub const RULE_NAME: &str = "replay-rule";

pub fn bus_arn() -> String {
    format!("arn:aws:events:{}:{}:event-bus/{}", REGION, ACCOUNT, BUS_NAME)
}

pub fn archive_arn() -> String {
    format!("arn:aws:events:{}:{}:archive/replay-archive", REGION, ACCOUNT)
}

pub fn state_machine_arn() -> String {
    format!("arn:aws:states:{}:{}:stateMachine:replay", REGION, ACCOUNT)
}

pub fn rule_role_arn() -> String {
    format!("arn:aws:iam::{}:role/replay-rule", ACCOUNT)
}

/// Temporary directory containing a deployment outputs document
pub struct Deployment {
    dir: TempDir,
    outputs_path: PathBuf,
}

impl Deployment {
    /// Write a complete outputs document under `<root>/infra/cdk.out/`
    pub fn new() -> io::Result<Self> {
        let document = json!({
            STACK_NAME: {
                "eventBusArchiveName": "replay-archive",
                "eventBusArchiveArn": archive_arn(),
                "eventBusName": BUS_NAME,
                "eventBusArn": bus_arn(),
                "replayRuleRoleArn": rule_role_arn(),
                "replayStateMachineArn": state_machine_arn(),
                "replayRuleName": format!("{}|{}", BUS_NAME, RULE_NAME),
            }
        });
        Self::with_document(&document.to_string())
    }

    /// Write `document` verbatim as the outputs document
    pub fn with_document(document: &str) -> io::Result<Self> {
        let dir = TempDir::new()?;
        let nested = dir.path().join("infra").join("cdk.out");
        fs::create_dir_all(&nested)?;
        // Decoy directory that sorts after `infra`
        fs::create_dir_all(dir.path().join("node_modules"))?;

        let outputs_path = nested.join("outputs.json");
        fs::write(&outputs_path, document)?;
        Ok(Self { dir, outputs_path })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn outputs_path(&self) -> &Path {
        &self.outputs_path
    }
}
