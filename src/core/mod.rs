pub mod dispatcher;
pub mod ledger;
pub mod matcher;
pub mod parser;
pub mod pool;
pub mod postprocess;
pub mod progress;
pub mod renamer;
pub mod resolver;
pub mod retry;
pub mod scanner;
pub mod tagger;
