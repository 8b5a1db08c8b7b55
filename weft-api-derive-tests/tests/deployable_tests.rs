use serde::{Deserialize, Serialize};
use serde_json::json;
use weft_api::{deployable, Deployable, FunctionDefinition};

// Plain synchronous function
#[deployable]
fn add(a: i64, b: i64) -> i64 {
    a + b
}

// Async function
#[deployable]
async fn shout(text: String) -> String {
    tokio::task::yield_now().await;
    text.to_uppercase()
}

// Result return: Err becomes the call's error text
#[deployable]
fn checked_div(a: i64, b: i64) -> Result<i64, String> {
    if b == 0 {
        Err("division by zero".to_string())
    } else {
        Ok(a / b)
    }
}

// Unit return encodes as null
#[deployable]
fn noop() {}

// Structured arguments and results
#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Point {
    x: f64,
    y: f64,
}

#[deployable]
fn midpoint(a: Point, b: Point) -> Point {
    Point {
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
    }
}

// Custom catalog name and type name
#[deployable(name = "math.scale", ident = "Scale")]
async fn scale(values: Vec<f64>, factor: f64) -> Vec<f64> {
    values.into_iter().map(|v| v * factor).collect()
}

// anyhow errors work through Display
#[deployable]
fn parse_port(text: String) -> anyhow::Result<u16> {
    Ok(text.parse::<u16>()?)
}

// Generated code reached through a re-export instead of `::weft_api`
mod contract {
    pub use weft_api::{BoxedFuture, Deployable, Value, __private};
}

#[deployable(crate = "crate::contract")]
fn negate(x: i64) -> i64 {
    -x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_constants() {
        assert_eq!(AddFn::NAME, "add");
        assert_eq!(AddFn::ARITY, 2);
        assert_eq!(ShoutFn::ARITY, 1);
        assert_eq!(NoopFn::ARITY, 0);
        assert_eq!(CheckedDivFn::NAME, "checked_div");
        assert_eq!(Scale::NAME, "math.scale");
        assert_eq!(Scale::definition(), FunctionDefinition::named("math.scale", 2));
    }

    #[test]
    fn test_original_function_still_callable() {
        assert_eq!(add(2, 3), 5);
        assert_eq!(checked_div(9, 3), Ok(3));
    }

    #[tokio::test]
    async fn test_sync_invoke() {
        assert_eq!(AddFn::invoke(vec![json!(2), json!(3)]).await, Ok(json!(5)));
    }

    #[tokio::test]
    async fn test_async_invoke() {
        assert_eq!(ShoutFn::invoke(vec![json!("hi")]).await, Ok(json!("HI")));
        assert_eq!(
            Scale::invoke(vec![json!([1.0, 2.5]), json!(2.0)]).await,
            Ok(json!([2.0, 5.0]))
        );
    }

    #[tokio::test]
    async fn test_result_mapping() {
        assert_eq!(CheckedDivFn::invoke(vec![json!(9), json!(3)]).await, Ok(json!(3)));
        assert_eq!(
            CheckedDivFn::invoke(vec![json!(1), json!(0)]).await,
            Err("division by zero".to_string())
        );
        assert_eq!(ParsePortFn::invoke(vec![json!("8080")]).await, Ok(json!(8080)));
        assert!(ParsePortFn::invoke(vec![json!("99999")]).await.is_err());
    }

    #[tokio::test]
    async fn test_crate_path_option() {
        assert_eq!(NegateFn::NAME, "negate");
        assert_eq!(NegateFn::invoke(vec![json!(4)]).await, Ok(json!(-4)));
    }

    #[tokio::test]
    async fn test_unit_return_is_null() {
        assert_eq!(NoopFn::invoke(vec![]).await, Ok(json!(null)));
    }

    #[tokio::test]
    async fn test_structured_arguments() {
        let result = MidpointFn::invoke(vec![
            json!({ "x": 0.0, "y": 0.0 }),
            json!({ "x": 2.0, "y": 4.0 }),
        ])
        .await
        .unwrap();
        let point: Point = serde_json::from_value(result).unwrap();
        assert_eq!(point, Point { x: 1.0, y: 2.0 });
    }

    #[tokio::test]
    async fn test_argument_count_mismatch() {
        let err = AddFn::invoke(vec![json!(1)]).await.unwrap_err();
        assert_eq!(err, "add expects 2 argument(s), got 1");

        let err = NoopFn::invoke(vec![json!(1)]).await.unwrap_err();
        assert!(err.contains("expects 0 argument(s)"));
    }

    #[tokio::test]
    async fn test_undecodable_argument() {
        let err = AddFn::invoke(vec![json!(1), json!("two")]).await.unwrap_err();
        assert!(err.starts_with("add: argument 2 is invalid"), "{}", err);
    }

    #[tokio::test]
    async fn test_executable_matches_invoke() {
        let executable = AddFn::executable();
        assert_eq!(executable(vec![json!(20), json!(22)]).await, Ok(json!(42)));
    }
}
