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

//! Substitution of path parameters into ARM path templates.
//!
//! ARM operations are described by templates such as
//! `/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}`. Each
//! placeholder must be replaced by exactly one path segment. Values are
//! percent-encoded, and values that are missing, empty, or contain a `/` are
//! rejected before any request is sent.

use crate::Result;
use crate::error::Error;
use crate::error::binding::{BindingError, SubstitutionFail, SubstitutionMismatch};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters escaped in a path segment.
const SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/');

/// Expands `template` using the `(name, value)` pairs in `params`.
///
/// All problems are reported at once, in a single [BindingError].
///
/// # Example
/// ```
/// # use azure_arm_gax::path_parameter::expand;
/// let path = expand(
///     "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}",
///     &[("subscriptionId", "sub-1"), ("resourceGroupName", "my rg")],
/// )?;
/// assert_eq!(path, "/subscriptions/sub-1/resourceGroups/my%20rg");
/// # Ok::<(), azure_arm_gax::error::Error>(())
/// ```
pub fn expand(template: &str, params: &[(&str, &str)]) -> Result<String> {
    let mut path = String::with_capacity(template.len());
    let mut problems = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        path.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            problems.push(mismatch(after, SubstitutionFail::MalformedTemplate));
            rest = "";
            break;
        };
        let name = &after[..end];
        rest = &after[end + 1..];
        if name.is_empty() || name.contains('{') {
            problems.push(mismatch(name, SubstitutionFail::MalformedTemplate));
            continue;
        }
        match params.iter().find(|(n, _)| *n == name) {
            None => problems.push(mismatch(name, SubstitutionFail::Unset)),
            Some((_, v)) if v.is_empty() => {
                problems.push(mismatch(name, SubstitutionFail::Empty));
            }
            Some((_, v)) if v.contains('/') => {
                problems.push(mismatch(
                    name,
                    SubstitutionFail::ContainsSlash(v.to_string()),
                ));
            }
            Some((_, v)) => path.extend(utf8_percent_encode(v, SEGMENT_ENCODE_SET)),
        }
    }
    path.push_str(rest);
    if problems.is_empty() {
        return Ok(path);
    }
    Err(Error::binding(BindingError {
        template: template.to_string(),
        problems,
    }))
}

fn mismatch(name: &str, problem: SubstitutionFail) -> SubstitutionMismatch {
    SubstitutionMismatch {
        name: name.to_string(),
        problem,
    }
}
