// Copyright 2024-2025 Golem Cloud
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod codegen;
pub mod error;
pub mod extractor;
pub mod fs;
pub mod log;
pub mod model;

#[cfg(test)]
test_r::enable!();

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "golem-sdk-codegen", version)]
pub enum Command {
    /// Extract JSON schemas from Protocol Buffer sources
    Extract(ExtractArgs),
    /// Generate SDK sources from previously extracted JSON schemas
    Generate(GenerateArgs),
}

/// Extract JSON schemas from Protocol Buffer sources
///
/// Every top-level message whose name ends with the configured suffix becomes
/// a root schema; message types referenced from a root are captured once as
/// shared type schemas under a types/ subdirectory.
#[derive(clap::Args, Debug)]
#[command(version, about, long_about = None)]
pub struct ExtractArgs {
    /// Directory containing the .proto files to extract from
    #[clap(short, long)]
    pub proto_dir: PathBuf,
    /// Output directory for the extracted JSON schemas
    #[clap(short, long)]
    pub schema_out_dir: PathBuf,
    /// Additional import roots for resolving proto dependencies. Can be given
    /// multiple times.
    #[clap(short, long)]
    pub include_dir: Vec<PathBuf>,
    /// Directory with minimal stub definitions satisfying otherwise
    /// unresolvable third-party imports (e.g. option-validation protos)
    #[clap(long)]
    pub stub_dir: Option<PathBuf>,
    /// Suffix of the messages to extract as generation roots
    #[clap(short, long, default_value = "TaskConfig")]
    pub message_suffix: String,
}

/// Generate SDK sources from previously extracted JSON schemas
///
/// The output package of every schema is derived from its proto namespace;
/// shared types are emitted once per top-level domain and imported by all
/// consuming packages, which keeps the generated import graph acyclic.
#[derive(clap::Args, Debug)]
#[command(version, about, long_about = None)]
pub struct GenerateArgs {
    /// Directory containing the schema JSON files, including nested domain
    /// subdirectories
    #[clap(short, long)]
    pub schema_dir: PathBuf,
    /// Root directory for the generated source tree
    #[clap(short, long)]
    pub output_root: PathBuf,
}

pub fn extract(args: ExtractArgs) -> anyhow::Result<()> {
    extractor::extract(&args)
}

pub fn generate(args: GenerateArgs) -> anyhow::Result<()> {
    let generator = codegen::Generator::new(&args.schema_dir, &args.output_root);
    generator.run().map(|_| ())
}
