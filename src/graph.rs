//! Weighted undirected graphs and their text format.
//!
//! The first non-blank line is the header `<vertices> <edges> <source>`; every
//! following non-blank line is one edge `<u> <v> <weight>`. Vertices are
//! numbered from zero.
//!
//! ```text
//! 4 4 0
//! 0 1 1
//! 1 2 2
//! 0 2 5
//! 2 3 1
//! ```
//!
//! 带权无向图及其文本格式。
//! 第一个非空行是头部 `<vertices> <edges> <source>`；之后每个非空行是一条边
//! `<u> <v> <weight>`。顶点从零开始编号。

use crate::arena::VertexId;
use crate::error::{Error, GraphError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

/// Edge weight. Weights are non-negative by construction.
pub type Weight = u64;

/// Largest vertex count a graph accepts.
/// 图允许的最大顶点数。
pub const MAX_VERTICES: usize = 1 << 28;

/// Adjacency-list graph with a designated source vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    adjacency: Vec<Vec<(VertexId, Weight)>>,
    source: VertexId,
    edges: usize,
}

impl Graph {
    /// Create a graph of `num_vertices` isolated vertices.
    ///
    /// At most `MAX_VERTICES` vertices, and `source` must be one of them.
    pub fn new(num_vertices: usize, source: VertexId) -> Result<Self> {
        if num_vertices > MAX_VERTICES {
            return Err(GraphError::TooManyVertices { num_vertices }.into());
        }
        if source.index() >= num_vertices {
            return Err(GraphError::SourceOutOfRange {
                vertex: u64::from(source.0),
                num_vertices,
            }
            .into());
        }
        let mut adjacency = Vec::new();
        adjacency
            .try_reserve_exact(num_vertices)
            .map_err(|_| GraphError::TooManyVertices { num_vertices })?;
        adjacency.resize_with(num_vertices, Vec::new);
        Ok(Self {
            adjacency,
            source,
            edges: 0,
        })
    }

    /// Add the undirected edge `u - v`; each endpoint lists the other as a neighbor.
    ///
    /// # Panics
    /// If either endpoint is not a vertex of this graph.
    pub fn add_edge(&mut self, u: VertexId, v: VertexId, weight: Weight) {
        let n = self.adjacency.len();
        assert!(u.index() < n && v.index() < n, "edge {u} - {v} is out of range for {n} vertices");
        self.adjacency[u.index()].push((v, weight));
        self.adjacency[v.index()].push((u, weight));
        self.edges += 1;
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.adjacency.len()
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges
    }

    #[inline]
    pub fn source(&self) -> VertexId {
        self.source
    }

    /// Edges incident to `vertex` as `(neighbor, weight)` pairs.
    #[inline]
    pub fn neighbors(&self, vertex: VertexId) -> &[(VertexId, Weight)] {
        &self.adjacency[vertex.index()]
    }

    /// Parse a graph from its text form.
    ///
    /// A header that declares a different edge count than the file contains is
    /// only logged; the edges actually present are used.
    ///
    /// 从文本形式解析图。
    /// 头部声明的边数与文件实际内容不符时只记录日志，以实际存在的边为准。
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line));

        let (header_line, header) = loop {
            match lines.next() {
                Some((number, line)) => {
                    let line = line?;
                    if !line.trim().is_empty() {
                        break (number, line);
                    }
                }
                None => return Err(GraphError::MissingHeader.into()),
            }
        };
        let mut fields = header.split_whitespace();
        let num_vertices = parse_field(&mut fields, header_line, "vertex count")?;
        let declared_edges = parse_field(&mut fields, header_line, "edge count")?;
        let source = parse_field(&mut fields, header_line, "source vertex")?;

        let num_vertices = usize::try_from(num_vertices).unwrap_or(usize::MAX);
        if num_vertices > MAX_VERTICES {
            return Err(GraphError::TooManyVertices { num_vertices }.into());
        }
        if source >= num_vertices as u64 {
            return Err(GraphError::SourceOutOfRange { vertex: source, num_vertices }.into());
        }
        let mut graph = Graph::new(num_vertices, VertexId(source as u32))?;

        for (number, line) in lines {
            let line = line?;
            let mut fields = line.split_whitespace();
            let Some(first) = fields.next() else {
                continue;
            };
            let u = parse_number(first, number, "edge endpoint")?;
            let v = parse_field(&mut fields, number, "edge endpoint")?;
            let weight = parse_field(&mut fields, number, "edge weight")?;
            let u = vertex_in_range(u, number, num_vertices)?;
            let v = vertex_in_range(v, number, num_vertices)?;
            graph.add_edge(u, v, weight);
        }

        if graph.num_edges() as u64 != declared_edges {
            log::warn!(
                "graph header declares {declared_edges} edges but {} were read",
                graph.num_edges()
            );
        }
        log::debug!(
            "parsed graph with {} vertices, {} edges, source {}",
            graph.num_vertices(),
            graph.num_edges(),
            graph.source()
        );
        Ok(graph)
    }

    /// Read a graph from the file at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

impl FromStr for Graph {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        Self::from_reader(text.as_bytes())
    }
}

fn parse_number(value: &str, line: usize, field: &'static str) -> Result<u64> {
    value.parse().map_err(|_| {
        GraphError::InvalidNumber {
            line,
            field,
            value: value.to_owned(),
        }
        .into()
    })
}

fn parse_field<'a>(
    fields: &mut impl Iterator<Item = &'a str>,
    line: usize,
    field: &'static str,
) -> Result<u64> {
    let value = fields.next().ok_or(GraphError::MissingField { line, field })?;
    parse_number(value, line, field)
}

fn vertex_in_range(vertex: u64, line: usize, num_vertices: usize) -> Result<VertexId> {
    if vertex < num_vertices as u64 {
        Ok(VertexId(vertex as u32))
    } else {
        Err(GraphError::VertexOutOfRange { line, vertex, num_vertices }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_edges() {
        let graph: Graph = "3 2 1\n1 0 4\n\n1 2 7\n".parse().unwrap();
        assert_eq!(graph.num_vertices(), 3);
        assert_eq!(graph.num_edges(), 2);
        assert_eq!(graph.source(), VertexId(1));
        assert_eq!(graph.neighbors(VertexId(1)), &[(VertexId(0), 4), (VertexId(2), 7)]);
        assert_eq!(graph.neighbors(VertexId(0)), &[(VertexId(1), 4)]);
        assert_eq!(graph.neighbors(VertexId(2)), &[(VertexId(1), 7)]);
    }

    #[test]
    fn leading_blank_lines_are_skipped() {
        let graph: Graph = "\n   \n1 0 0\n".parse().unwrap();
        assert_eq!(graph.num_vertices(), 1);
    }

    #[test]
    fn empty_input_has_no_header() {
        let err = "".parse::<Graph>().unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::MissingHeader)));
    }

    #[test]
    fn reports_bad_lines() {
        let err = "2 1 0\n0 x 3\n".parse::<Graph>().unwrap_err();
        match err {
            Error::Graph(GraphError::InvalidNumber { line, field, value }) => {
                assert_eq!((line, field, value.as_str()), (2, "edge endpoint", "x"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = "2 1 0\n0 1\n".parse::<Graph>().unwrap_err();
        assert!(matches!(
            err,
            Error::Graph(GraphError::MissingField { line: 2, field: "edge weight" })
        ));

        let err = "2 1 0\n0 5 1\n".parse::<Graph>().unwrap_err();
        assert!(matches!(
            err,
            Error::Graph(GraphError::VertexOutOfRange { line: 2, vertex: 5, num_vertices: 2 })
        ));

        let err = "2 0 2\n".parse::<Graph>().unwrap_err();
        assert!(matches!(
            err,
            Error::Graph(GraphError::SourceOutOfRange { vertex: 2, num_vertices: 2 })
        ));
    }

    #[test]
    fn oversized_vertex_count_is_rejected() {
        let err = "4000000000 0 0\n".parse::<Graph>().unwrap_err();
        assert!(matches!(
            err,
            Error::Graph(GraphError::TooManyVertices { num_vertices: 4_000_000_000 })
        ));

        let err = Graph::new(MAX_VERTICES + 1, VertexId(0)).unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::TooManyVertices { .. })));
    }

    #[test]
    fn edge_count_mismatch_is_tolerated() {
        let graph: Graph = "2 5 0\n0 1 1\n".parse().unwrap();
        assert_eq!(graph.num_edges(), 1);
    }
}
