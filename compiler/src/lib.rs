// depcanon — asynchronous dependency canonicalizer
//
// Library root. Front end (lexer, parser, lower) produces the program
// arena in `ir`; the analysis passes run in pipeline order:
// graph → tracer → edges → stitch → reduce → rewrite.

pub mod ast;
pub mod diag;
pub mod dot;
pub mod edges;
pub mod graph;
pub mod id;
pub mod ir;
pub mod lexer;
pub mod lower;
pub mod memref;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod reduce;
pub mod rewrite;
pub mod stitch;
pub mod tracer;
