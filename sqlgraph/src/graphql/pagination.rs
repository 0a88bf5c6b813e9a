//! Cursor-based pagination types for GraphQL
//!
//! Implements the Relay Connection specification for reflected types that
//! request connection support, and for relationships to them.

use std::fmt;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use super::Registry;
use crate::mapping::RelationshipProperty;

/// Information about pagination in a connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    /// When paginating forwards, are there more items?
    pub has_next_page: bool,
    /// When paginating backwards, are there more items?
    pub has_previous_page: bool,
    /// Cursor of the first item in this page
    pub start_cursor: Option<String>,
    /// Cursor of the last item in this page
    pub end_cursor: Option<String>,
}

/// An edge in a connection, containing a node and cursor
#[derive(Debug, Clone)]
pub struct Edge<T> {
    /// The item at the end of the edge
    pub node: T,
    /// A cursor for pagination
    pub cursor: String,
}

/// A page of a paginated connection
#[derive(Debug, Clone)]
pub struct Connection<T> {
    /// The edges in this connection
    pub edges: Vec<Edge<T>>,
    /// Pagination information
    pub page_info: PageInfo,
    /// Total count of items, across all pages
    pub total_count: i64,
}

impl<T> Connection<T> {
    /// Create an empty connection
    pub fn empty() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo::default(),
            total_count: 0,
        }
    }

    /// Create a connection from a list of items
    ///
    /// # Arguments
    /// * `items` - The items to include in this page
    /// * `offset` - The offset of the first item (for cursor generation)
    /// * `total` - Total count of items matching the query
    pub fn from_items(items: Vec<T>, offset: i64, total: i64) -> Self {
        let has_next_page = (offset + items.len() as i64) < total;
        let has_previous_page = offset > 0;

        let edges: Vec<Edge<T>> = items
            .into_iter()
            .enumerate()
            .map(|(i, node)| Edge {
                cursor: encode_cursor(offset + i as i64),
                node,
            })
            .collect();

        let page_info = PageInfo {
            has_next_page,
            has_previous_page,
            start_cursor: edges.first().map(|e| e.cursor.clone()),
            end_cursor: edges.last().map(|e| e.cursor.clone()),
        };

        Self {
            edges,
            page_info,
            total_count: total,
        }
    }

    /// Page through an already loaded collection.
    pub fn paginate(all: Vec<T>, offset: i64, limit: i64) -> Self {
        let total = all.len() as i64;
        let items: Vec<T> = all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Self::from_items(items, offset, total)
    }
}

/// Encode an offset as a cursor string
pub fn encode_cursor(offset: i64) -> String {
    BASE64.encode(format!("cursor:{}", offset))
}

/// Decode a cursor string to an offset
pub fn decode_cursor(cursor: &str) -> Result<i64, &'static str> {
    let decoded = BASE64.decode(cursor).map_err(|_| "invalid cursor format")?;

    let s = String::from_utf8(decoded).map_err(|_| "invalid cursor encoding")?;

    let Some(value) = s.strip_prefix("cursor:") else {
        return Err("invalid cursor prefix");
    };

    let offset: i64 = value.parse().map_err(|_| "invalid cursor value")?;
    if offset < 0 {
        return Err("invalid cursor value");
    }
    Ok(offset)
}

/// Parse pagination arguments into offset and limit
pub fn parse_pagination_args(
    first: Option<i32>,
    after: Option<String>,
) -> Result<(i64, i64), &'static str> {
    let limit = first.unwrap_or(25).clamp(0, 100) as i64;

    let offset = if let Some(cursor) = after {
        decode_cursor(&cursor)?
            .checked_add(1) // Start after the cursor
            .ok_or("invalid cursor value")?
    } else {
        0
    };

    Ok((offset, limit))
}

/// A connection type over a reflected node type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionType {
    pub name: String,
    /// Name of the node type
    pub node: String,
    /// Name of the edge type
    pub edge: String,
    /// Whether the connection exposes `totalCount`
    pub total_count: bool,
}

impl ConnectionType {
    /// Whether this is a connection over `type_name`.
    pub fn is_over(&self, type_name: &str) -> bool {
        self.node == type_name
    }
}

/// Creates connection types; the application's choice of connection flavor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionClass {
    pub total_count: bool,
}

impl ConnectionClass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_total_count(mut self, total_count: bool) -> Self {
        self.total_count = total_count;
        self
    }

    /// Create the connection type `name` over `node`. The edge is named after the connection.
    pub fn create_type(&self, name: impl Into<String>, node: impl Into<String>) -> ConnectionType {
        let name = name.into();
        let edge = format!("{}Edge", name.strip_suffix("Connection").unwrap_or(&name));
        ConnectionType {
            name,
            node: node.into(),
            edge,
            total_count: self.total_count,
        }
    }
}

/// A paginated field over a connection type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionField {
    pub connection: Arc<ConnectionType>,
    /// Whether the relationship is loaded in batches
    pub batching: bool,
}

/// Builds the connection field for a relationship to a type with connection support.
pub type ConnectionFieldFactory =
    Arc<dyn Fn(&RelationshipProperty, &Registry, bool) -> Option<ConnectionField> + Send + Sync>;

/// Wraps the connection of the relationship target's registered type.
pub fn default_connection_field_factory() -> ConnectionFieldFactory {
    Arc::new(|relationship, registry, batching| {
        let target = registry.type_for_model(&relationship.target)?;
        let connection = target.connection.clone()?;
        Some(ConnectionField {
            connection,
            batching,
        })
    })
}

pub(crate) struct FactoryDebug<'a>(pub &'a Option<ConnectionFieldFactory>);

impl fmt::Debug for FactoryDebug<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("Some(..)"),
            None => f.write_str("None"),
        }
    }
}
