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
use serde::{Deserialize, Serialize};

#[response(identity = "ConfigChangeBatchListenResponse", module = "config")]
pub(crate) struct ConfigChangeBatchListenResponse {
    pub(crate) changed_configs: Vec<ConfigContext>,
}

/// A key whose md5 on the server differs from the one listened with.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ConfigContext {
    #[serde(rename = "dataId")]
    pub(crate) data_id: String,
    pub(crate) group: String,
    #[serde(rename = "tenant")]
    pub(crate) namespace: String,
}
