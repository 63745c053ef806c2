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

use rand::Rng;

use crate::api::error::Error::{ErrResult, NotFound};
use crate::api::error::Result;
use crate::api::naming::NacosServiceInstance;

const MAX_WEIGHT: f64 = 10000.0;
const DOUBLE_PRECISION_DELTA: f64 = 0.0001;

/// Picks an instance at random, with probability proportional to its weight.
pub(crate) struct RandomWeightChooser {
    /// Cumulative weights normalized to end at 1.0.
    weights: Vec<f64>,

    items: Vec<NacosServiceInstance>,
}

impl RandomWeightChooser {
    pub(crate) fn new(service_name: &str, items: Vec<NacosServiceInstance>) -> Result<Self> {
        let items: Vec<NacosServiceInstance> = items
            .into_iter()
            .filter(|instance| instance.weight > 0.0)
            .collect();
        if items.is_empty() {
            return Err(NotFound(format!("no available instance of {service_name}")));
        }

        let normalized = |weight: f64| {
            if weight.is_nan() {
                1.0
            } else {
                weight.min(MAX_WEIGHT)
            }
        };
        let weight_sum: f64 = items.iter().map(|instance| normalized(instance.weight)).sum();

        let mut weights = Vec::with_capacity(items.len());
        let mut random_range = 0_f64;
        for instance in items.iter() {
            random_range += normalized(instance.weight) / weight_sum;
            weights.push(random_range);
        }

        match weights.last() {
            Some(last) if (last - 1.0).abs() < DOUBLE_PRECISION_DELTA => Ok(RandomWeightChooser { weights, items }),
            _ => Err(ErrResult(format!("cumulative weight of {service_name} is not 1.0"))),
        }
    }

    pub(crate) fn choose(mut self) -> Option<NacosServiceInstance> {
        let random_number = rand::thread_rng().gen_range(0.0..1.0);
        let index = match self.weights.binary_search_by(|w| w.total_cmp(&random_number)) {
            Ok(index) => index,
            Err(index) => index,
        };
        if index < self.items.len() {
            return Some(self.items.swap_remove(index));
        }
        self.items.pop()
    }
}
