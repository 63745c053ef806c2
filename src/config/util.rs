// Licensed to the Apache Software Foundation (ASF) under one or more
// contributor license agreements.  See the NOTICE file distributed with
// this work for additional information regarding copyright ownership.
// The ASF licenses this file to You under the Apache License, Version 2.0
// (the "License"); you may not use this file except in compliance with
// the License.  You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use crate::api::constants::{CONFIG_GROUP_KEY_SPLITER, DEFAULT_GROUP};
use crate::api::error::{Error, Result};

/// data_id '+_+' group '+_+' namespace
pub(crate) fn group_key(data_id: &str, group: &str, namespace: &str) -> String {
    [data_id, group, namespace].join(CONFIG_GROUP_KEY_SPLITER)
}

fn is_valid(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

/// Checks data_id and group, returning the group to use.
pub(crate) fn check_key(data_id: &str, group: &str) -> Result<String> {
    if data_id.trim().is_empty() {
        return Err(Error::Validation("data_id must not be empty".to_string()));
    }
    if !is_valid(data_id) {
        return Err(Error::Validation(format!("data_id {data_id:?} has illegal characters")));
    }
    if group.trim().is_empty() {
        return Ok(DEFAULT_GROUP.to_owned());
    }
    if !is_valid(group) {
        return Err(Error::Validation(format!("group {group:?} has illegal characters")));
    }
    Ok(group.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_key() {
        assert_eq!(group_key("todo-dataid", "LOVE", ""), "todo-dataid+_+LOVE+_+");
        assert_eq!(group_key("todo-dataid", "LOVE", "ns"), "todo-dataid+_+LOVE+_+ns");
    }

    #[test]
    fn test_check_key() {
        assert_eq!(check_key("todo-dataid", "LOVE").unwrap(), "LOVE");
        assert_eq!(check_key("app.yaml", "").unwrap(), DEFAULT_GROUP);
        assert_eq!(check_key("a:b_c-d.e", " ").unwrap(), DEFAULT_GROUP);

        assert!(matches!(check_key("", "LOVE"), Err(Error::Validation(_))));
        assert!(matches!(check_key("todo dataid", "LOVE"), Err(Error::Validation(_))));
        assert!(matches!(check_key("todo", "LO/VE"), Err(Error::Validation(_))));
    }
}
