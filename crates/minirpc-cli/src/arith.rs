// Copyright 2025 MiniRPC Authors
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

//! Built-in `Arith` demo service.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use minirpc_common::Result;
use minirpc_server::Service;

/// Arguments of every `Arith` method.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Args {
    pub num1: i64,
    pub num2: i64,
}

/// Receiver of the `Arith` service.
#[derive(Debug, Default)]
pub struct Arith;

/// Builds the `Arith` service.
///
/// - `Sum`: `num1 + num2`
/// - `Mul`: `num1 * num2`
/// - `Sleep`: waits `num1` milliseconds, then returns `num1 + num2`
pub fn service() -> Result<Service> {
    Service::builder("Arith", Arith)
        .method("Sum", |_: &Arith, args: Args, reply: &mut i64| {
            *reply = args
                .num1
                .checked_add(args.num2)
                .ok_or("arith: overflow")?;
            Ok::<(), &str>(())
        })
        .method("Mul", |_: &Arith, args: Args, reply: &mut i64| {
            *reply = args
                .num1
                .checked_mul(args.num2)
                .ok_or("arith: overflow")?;
            Ok::<(), &str>(())
        })
        .async_method("Sleep", |_: Arc<Arith>, args: Args, _: i64| async move {
            if args.num1 < 0 {
                return Err("arith: negative sleep");
            }
            tokio::time::sleep(Duration::from_millis(args.num1 as u64)).await;
            Ok(args.num1.saturating_add(args.num2))
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use minirpc_common::CodecType;

    async fn invoke(method: &str, args: Args) -> std::result::Result<i64, String> {
        let service = service().unwrap();
        let codec = CodecType::Json;
        let body = codec.encode(&args).unwrap();
        let reply = service
            .method(method)
            .unwrap()
            .prepare(codec, &body)
            .unwrap()
            .run()
            .await?;
        Ok(codec.decode(&reply).unwrap())
    }

    #[tokio::test]
    async fn test_sum_and_mul() {
        assert_eq!(invoke("Sum", Args { num1: 2, num2: 3 }).await, Ok(5));
        assert_eq!(invoke("Mul", Args { num1: 2, num2: 3 }).await, Ok(6));
    }

    #[tokio::test]
    async fn test_overflow_is_an_error() {
        let err = invoke("Mul", Args { num1: i64::MAX, num2: 2 }).await.unwrap_err();
        assert_eq!(err, "arith: overflow");
    }

    #[tokio::test]
    async fn test_sleep() {
        assert_eq!(invoke("Sleep", Args { num1: 10, num2: 1 }).await, Ok(11));
        assert!(invoke("Sleep", Args { num1: -1, num2: 0 }).await.is_err());
    }

    #[test]
    fn test_service_shape() {
        let service = service().unwrap();
        assert_eq!(service.name(), "Arith");
        let names: Vec<_> = service.methods().map(|m| m.name().to_string()).collect();
        assert_eq!(names, vec!["Mul", "Sleep", "Sum"]);
    }
}
