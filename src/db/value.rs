use std::fmt;

use sqlx::{mysql::MySqlArguments, Arguments};

/// A bound statement parameter.
///
/// Kept as a closed set so failed statements can be logged together with
/// their parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl SqlParam {
    fn add_to(&self, args: &mut MySqlArguments) {
        match self {
            SqlParam::Null => args.add(Option::<String>::None),
            SqlParam::Bool(v) => args.add(*v),
            SqlParam::Int(v) => args.add(*v),
            SqlParam::UInt(v) => args.add(*v),
            SqlParam::Float(v) => args.add(*v),
            SqlParam::Text(v) => args.add(v.clone()),
        }
    }
}

pub(crate) fn arguments(params: &[SqlParam]) -> MySqlArguments {
    let mut args = MySqlArguments::default();
    for p in params {
        p.add_to(&mut args);
    }
    args
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlParam::Null => f.write_str("NULL"),
            SqlParam::Bool(v) => write!(f, "{v}"),
            SqlParam::Int(v) => write!(f, "{v}"),
            SqlParam::UInt(v) => write!(f, "{v}"),
            SqlParam::Float(v) => write!(f, "{v}"),
            SqlParam::Text(v) => write!(f, "{v:?}"),
        }
    }
}

/// Renders a parameter list for log lines, e.g. `[1, "a@b.c"]`.
pub(crate) fn display_params(params: &[SqlParam]) -> String {
    let parts: Vec<String> = params.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Int(v)
    }
}

impl From<u32> for SqlParam {
    fn from(v: u32) -> Self {
        SqlParam::UInt(u64::from(v))
    }
}

impl From<u64> for SqlParam {
    fn from(v: u64) -> Self {
        SqlParam::UInt(v)
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::Float(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlParam::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(SqlParam::from(7u64), SqlParam::UInt(7));
        assert_eq!(SqlParam::from("x"), SqlParam::Text("x".into()));
        assert_eq!(SqlParam::from(None::<i64>), SqlParam::Null);
        assert_eq!(SqlParam::from(Some(-3i64)), SqlParam::Int(-3));
    }

    #[test]
    fn params_render_for_logs() {
        let params = [SqlParam::from(1u64), SqlParam::from("a@b.c"), SqlParam::Null];
        assert_eq!(display_params(&params), r#"[1, "a@b.c", NULL]"#);
    }
}
