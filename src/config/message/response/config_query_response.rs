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

use nacos_macro::response;

const CONFIG_NOT_FOUND: i32 = 300;
const CONFIG_QUERY_CONFLICT: i32 = 400;

#[response(identity = "ConfigQueryResponse", module = "config")]
pub(crate) struct ConfigQueryResponse {
    /// json, properties, text, html, xml, yaml ...
    pub(crate) content_type: Option<String>,
    pub(crate) content: Option<String>,
    pub(crate) md5: Option<String>,
    pub(crate) last_modified: i64,
}

impl ConfigQueryResponse {
    pub(crate) fn is_not_found(&self) -> bool {
        self.error_code == CONFIG_NOT_FOUND
    }

    pub(crate) fn is_query_conflict(&self) -> bool {
        self.error_code == CONFIG_QUERY_CONFLICT
    }
}
