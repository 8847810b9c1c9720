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

use colored::{ColoredString, Colorize};
use std::path::{Path, PathBuf};

/// Consistent coloring for paths and identifiers embedded in log and error
/// messages.
pub trait LogColorize {
    fn log_str(&self) -> String;

    fn log_color_highlight(&self) -> ColoredString {
        self.log_str().bold()
    }

    fn log_color_error_highlight(&self) -> ColoredString {
        self.log_str().red().bold()
    }
}

impl LogColorize for str {
    fn log_str(&self) -> String {
        self.to_string()
    }
}

impl LogColorize for String {
    fn log_str(&self) -> String {
        self.clone()
    }
}

impl LogColorize for Path {
    fn log_str(&self) -> String {
        self.display().to_string()
    }
}

impl LogColorize for PathBuf {
    fn log_str(&self) -> String {
        self.display().to_string()
    }
}
