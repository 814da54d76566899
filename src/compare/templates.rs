use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::db::{GraphQuery, SqlQuery};
use crate::error::{DbError, Store};

/// The request types offered in the sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestKind {
    Follows,
    Purchases,
    Products,
    Users,
    Relation,
    Activity,
}

impl RequestKind {
    pub const ALL: [RequestKind; 6] = [
        RequestKind::Follows,
        RequestKind::Purchases,
        RequestKind::Products,
        RequestKind::Users,
        RequestKind::Relation,
        RequestKind::Activity,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RequestKind::Follows => "Follows",
            RequestKind::Purchases => "Purchases",
            RequestKind::Products => "Products",
            RequestKind::Users => "Users",
            RequestKind::Relation => "Relation",
            RequestKind::Activity => "Activity",
        }
    }

    /// Inputs the request type reads; the form only shows these.
    pub fn inputs(&self) -> &'static [Input] {
        match self {
            RequestKind::Follows
            | RequestKind::Purchases
            | RequestKind::Products
            | RequestKind::Users => &[Input::Count],
            RequestKind::Relation => &[Input::Count, Input::MinRelations],
            RequestKind::Activity => &[Input::Count, Input::MinRelations, Input::MinPurchases],
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RequestKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestKind::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DbError::UnknownRequest(s.to_string()))
    }
}

/// A numeric form input and its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Input {
    Count,
    MinRelations,
    MinPurchases,
}

impl Input {
    pub fn field(&self) -> &'static str {
        match self {
            Input::Count => "count",
            Input::MinRelations => "min_relations",
            Input::MinPurchases => "min_purchases",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Input::Count => "Number of rows",
            Input::MinRelations => "Minimum number of follows",
            Input::MinPurchases => "Minimum number of purchases",
        }
    }

    pub fn bounds(&self) -> (i64, i64) {
        match self {
            Input::Count => (1, 100_000),
            Input::MinRelations | Input::MinPurchases => (0, 10_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueryInputs {
    pub count: i64,
    pub min_relations: i64,
    pub min_purchases: i64,
}

impl Default for QueryInputs {
    fn default() -> Self {
        Self {
            count: 1_000,
            min_relations: 1,
            min_purchases: 1,
        }
    }
}

impl QueryInputs {
    pub fn value(&self, input: Input) -> i64 {
        match input {
            Input::Count => self.count,
            Input::MinRelations => self.min_relations,
            Input::MinPurchases => self.min_purchases,
        }
    }

    /// Checks the inputs `kind` uses against their bounds.
    pub fn validate(&self, kind: RequestKind) -> Result<(), DbError> {
        for input in kind.inputs() {
            let (min, max) = input.bounds();
            let value = self.value(*input);
            if !(min..=max).contains(&value) {
                return Err(DbError::OutOfRange {
                    field: input.field(),
                    min,
                    max,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// One relational query and its graph equivalent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPair {
    pub kind: RequestKind,
    pub sql: SqlQuery,
    pub graph: GraphQuery,
}

lazy_static! {
    static ref CYPHER_PARAM: Regex = Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap();
}

fn sql_placeholders(text: &str) -> usize {
    text.matches('?').count()
}

fn cypher_placeholders(text: &str) -> BTreeSet<&str> {
    CYPHER_PARAM
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect()
}

impl QueryPair {
    /// Binding arity must match the placeholders on both sides.
    pub fn validate(&self) -> Result<(), DbError> {
        let expected = sql_placeholders(self.sql.text);
        if expected != self.sql.params.len() {
            return Err(DbError::Arity {
                store: Store::Sql,
                expected: expected.to_string(),
                actual: self.sql.params.len().to_string(),
            });
        }
        let expected = cypher_placeholders(self.graph.text);
        let actual: BTreeSet<&str> = self.graph.params.iter().map(|(name, _)| *name).collect();
        if expected != actual || actual.len() != self.graph.params.len() {
            return Err(DbError::Arity {
                store: Store::Graph,
                expected: format!("{expected:?}"),
                actual: format!("{actual:?}"),
            });
        }
        Ok(())
    }
}

/// Builds the query pair for `kind`. Inputs the kind does not use are ignored.
pub fn build(kind: RequestKind, inputs: &QueryInputs) -> QueryPair {
    let QueryInputs {
        count,
        min_relations,
        min_purchases,
    } = *inputs;

    let (sql, graph) = match kind {
        RequestKind::Follows => (
            SqlQuery {
                text: "SELECT follower_id, followee_id FROM Follows LIMIT ?",
                params: vec![count],
            },
            GraphQuery {
                text: "MATCH (a:User)-[:FOLLOWS]->(b:User) \
                       RETURN a.id AS follower_id, b.id AS followee_id LIMIT $count",
                params: vec![("count", count)],
                columns: &["follower_id", "followee_id"],
            },
        ),
        RequestKind::Purchases => (
            SqlQuery {
                text: "SELECT id, user_id, product_id, quantity, total_price FROM Purchase LIMIT ?",
                params: vec![count],
            },
            GraphQuery {
                text: "MATCH (pu:Purchase) \
                       RETURN pu.id AS id, pu.user_id AS user_id, pu.product_id AS product_id, \
                       pu.quantity AS quantity, pu.total_price AS total_price LIMIT $count",
                params: vec![("count", count)],
                columns: &["id", "user_id", "product_id", "quantity", "total_price"],
            },
        ),
        RequestKind::Products => (
            SqlQuery {
                text: "SELECT id, name, price, description, image FROM Product LIMIT ?",
                params: vec![count],
            },
            GraphQuery {
                text: "MATCH (p:Product) \
                       RETURN p.id AS id, p.name AS name, p.price AS price, \
                       p.description AS description, p.image AS image LIMIT $count",
                params: vec![("count", count)],
                columns: &["id", "name", "price", "description", "image"],
            },
        ),
        RequestKind::Users => (
            SqlQuery {
                text: "SELECT id, email, hashed_password, full_name, role FROM User LIMIT ?",
                params: vec![count],
            },
            GraphQuery {
                text: "MATCH (u:User) \
                       RETURN u.id AS id, u.email AS email, u.hashed_password AS hashed_password, \
                       u.full_name AS full_name, u.role AS role LIMIT $count",
                params: vec![("count", count)],
                columns: &["id", "email", "hashed_password", "full_name", "role"],
            },
        ),
        RequestKind::Relation => (
            SqlQuery {
                text: "SELECT followee_id AS user_id, COUNT(*) AS followers FROM Follows \
                       GROUP BY followee_id HAVING COUNT(*) >= ? \
                       ORDER BY followers DESC, user_id LIMIT ?",
                params: vec![min_relations, count],
            },
            GraphQuery {
                text: "MATCH (:User)-[:FOLLOWS]->(u:User) \
                       WITH u, count(*) AS followers WHERE followers >= $min_relations \
                       RETURN u.id AS user_id, followers \
                       ORDER BY followers DESC, user_id LIMIT $count",
                params: vec![("min_relations", min_relations), ("count", count)],
                columns: &["user_id", "followers"],
            },
        ),
        RequestKind::Activity => (
            SqlQuery {
                text: "SELECT u.id AS user_id, p.purchases, f.follows FROM User u \
                       JOIN (SELECT user_id, COUNT(*) AS purchases FROM Purchase GROUP BY user_id) p \
                       ON p.user_id = u.id \
                       JOIN (SELECT follower_id, COUNT(*) AS follows FROM Follows GROUP BY follower_id) f \
                       ON f.follower_id = u.id \
                       WHERE p.purchases >= ? AND f.follows >= ? \
                       ORDER BY p.purchases DESC, user_id LIMIT ?",
                params: vec![min_purchases, min_relations, count],
            },
            GraphQuery {
                text: "MATCH (u:User)-[:FOLLOWS]->(:User) \
                       WITH u, count(*) AS follows WHERE follows >= $min_relations \
                       MATCH (pu:Purchase {user_id: u.id}) \
                       WITH u, follows, count(pu) AS purchases WHERE purchases >= $min_purchases \
                       RETURN u.id AS user_id, purchases, follows \
                       ORDER BY purchases DESC, user_id LIMIT $count",
                params: vec![
                    ("min_relations", min_relations),
                    ("min_purchases", min_purchases),
                    ("count", count),
                ],
                columns: &["user_id", "purchases", "follows"],
            },
        ),
    };

    QueryPair { kind, sql, graph }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_yields_matching_bindings() {
        for kind in RequestKind::ALL {
            let pair = build(kind, &QueryInputs::default());
            assert!(!pair.sql.text.is_empty(), "{kind}");
            assert!(!pair.graph.text.is_empty(), "{kind}");
            assert_eq!(sql_placeholders(pair.sql.text), pair.sql.params.len(), "{kind}");
            let names: BTreeSet<&str> = pair.graph.params.iter().map(|(n, _)| *n).collect();
            assert_eq!(cypher_placeholders(pair.graph.text), names, "{kind}");
            pair.validate().expect("valid pair");
        }
    }

    #[test]
    fn graph_columns_are_returned_by_the_query() {
        for kind in RequestKind::ALL {
            let pair = build(kind, &QueryInputs::default());
            for column in pair.graph.columns {
                assert!(
                    pair.graph.text.contains(&format!("AS {column}"))
                        || pair.graph.text.contains(&format!(", {column}"))
                        || pair.graph.text.contains(&format!("RETURN {column}")),
                    "{kind}: column {column} is not returned"
                );
            }
        }
    }

    #[test]
    fn inputs_are_bound_in_placeholder_order() {
        let inputs = QueryInputs {
            count: 25,
            min_relations: 3,
            min_purchases: 7,
        };
        let pair = build(RequestKind::Activity, &inputs);
        assert_eq!(pair.sql.params, vec![7, 3, 25]);
        assert!(pair.graph.params.contains(&("min_purchases", 7)));

        let pair = build(RequestKind::Relation, &inputs);
        assert_eq!(pair.sql.params, vec![3, 25]);

        let pair = build(RequestKind::Follows, &inputs);
        assert_eq!(pair.sql.params, vec![25]);
        assert_eq!(pair.graph.params, vec![("count", 25)]);
    }

    #[test]
    fn labels_parse_back() {
        for kind in RequestKind::ALL {
            assert_eq!(kind.label().parse::<RequestKind>().unwrap(), kind);
        }
        assert_eq!(" follows ".parse::<RequestKind>().unwrap(), RequestKind::Follows);
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = "Orders".parse::<RequestKind>().unwrap_err();
        assert!(matches!(err, DbError::UnknownRequest(ref s) if s == "Orders"));
    }

    #[test]
    fn mismatched_bindings_are_rejected() {
        let mut pair = build(RequestKind::Relation, &QueryInputs::default());
        pair.sql.params.pop();
        assert!(matches!(
            pair.validate(),
            Err(DbError::Arity { store: Store::Sql, .. })
        ));

        let mut pair = build(RequestKind::Relation, &QueryInputs::default());
        pair.graph.params[0].0 = "min_follows";
        assert!(matches!(
            pair.validate(),
            Err(DbError::Arity { store: Store::Graph, .. })
        ));

        let mut pair = build(RequestKind::Follows, &QueryInputs::default());
        pair.graph.params.push(("count", 1));
        assert!(pair.validate().is_err());
    }

    #[test]
    fn bounds_only_apply_to_used_inputs() {
        let inputs = QueryInputs {
            count: 10,
            min_relations: -5,
            min_purchases: 1,
        };
        assert!(inputs.validate(RequestKind::Users).is_ok());
        assert!(matches!(
            inputs.validate(RequestKind::Relation),
            Err(DbError::OutOfRange { field: "min_relations", .. })
        ));

        let too_many = QueryInputs {
            count: 100_001,
            ..QueryInputs::default()
        };
        assert!(too_many.validate(RequestKind::Follows).is_err());
    }
}
