pub mod config;
pub mod line_repair;
pub mod document_parser;
pub mod llm;
pub mod vector_index;
pub mod retriever;
pub mod requirement_extractor;
pub mod playbook_generator;
pub mod ansible;
pub mod report;
pub mod validation;
pub mod retry;
pub mod workflow;
#[cfg(test)]
pub mod mock;
