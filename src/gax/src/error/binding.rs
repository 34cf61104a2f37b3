// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// A failure to expand an ARM path template.
///
/// ARM request paths are built from templates such as
/// `/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}`. The
/// client cannot build the path when a parameter is missing, or when its value
/// would change the shape of the path.
#[derive(thiserror::Error, Debug, PartialEq)]
pub struct BindingError {
    /// The template that could not be expanded.
    pub template: String,
    /// All the parameters that could not be substituted, and why.
    pub problems: Vec<SubstitutionMismatch>,
}

/// Ways substituting a path parameter can fail.
#[derive(Debug, PartialEq)]
pub enum SubstitutionFail {
    /// The template names a parameter that was not provided.
    Unset,
    /// The parameter was provided, but it is empty.
    Empty,
    /// The parameter contains a `/`, which would add path segments.
    ///
    /// The parameter holds the offending value.
    ContainsSlash(String),
    /// The template has an unterminated `{` or an empty `{}` placeholder.
    MalformedTemplate,
}

/// A failure to substitute one parameter into a path template.
#[derive(Debug, PartialEq)]
pub struct SubstitutionMismatch {
    /// The name of the parameter, as it appears in the template.
    pub name: String,
    /// Why the substitution failed.
    pub problem: SubstitutionFail,
}

impl std::fmt::Display for SubstitutionMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.problem {
            SubstitutionFail::Unset => {
                write!(f, "parameter `{}` needs to be set", self.name)
            }
            SubstitutionFail::Empty => {
                write!(f, "parameter `{}` cannot be empty", self.name)
            }
            SubstitutionFail::ContainsSlash(actual) => {
                write!(
                    f,
                    "parameter `{}` cannot contain '/'; found: '{}'",
                    self.name, actual
                )
            }
            SubstitutionFail::MalformedTemplate => {
                write!(f, "malformed placeholder near `{}`", self.name)
            }
        }
    }
}

impl std::fmt::Display for BindingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot expand `{}`: ", self.template)?;
        for (i, sub) in self.problems.iter().enumerate() {
            if i != 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{sub}")?;
        }
        Ok(())
    }
}
