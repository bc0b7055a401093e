//! Calling-convention facts: signatures, return analyzers, call hooks.
//!
//! The host's calling-convention analysis decides where arguments and return
//! values live; this module only carries its conclusions. The type analyzer
//! uses them to tie return-site terms together and to pull the synthetic
//! argument/return terms of call sites into the census.

use relift_ir::{Function, Location, StatementId, TermId};
use std::collections::HashMap;

/// A reconstructed function signature.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    /// Function name.
    pub name: String,
    /// Locations carrying the arguments, in order.
    pub arguments: Vec<Location>,
    /// Location carrying the return value, if the function returns one.
    pub return_value: Option<Location>,
}

impl FunctionSignature {
    /// Creates a signature without arguments or a return value.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            return_value: None,
        }
    }

    /// Adds an argument location.
    pub fn with_argument(mut self, location: Location) -> Self {
        self.arguments.push(location);
        self
    }

    /// Sets the return-value location.
    pub fn with_return_value(mut self, location: Location) -> Self {
        self.return_value = Some(location);
        self
    }
}

/// Maps a return site's value locations to the terms that carry them.
#[derive(Debug, Clone, Default)]
pub struct ReturnAnalyzer {
    value_terms: HashMap<Location, TermId>,
}

impl ReturnAnalyzer {
    /// Creates an empty analyzer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the term carrying `location` at this return site.
    pub fn set_value_term(&mut self, location: Location, term: TermId) {
        self.value_terms.insert(location, term);
    }

    /// Returns the term carrying the given return-value location.
    pub fn return_value_term(&self, return_value: Location) -> Option<TermId> {
        self.value_terms.get(&return_value).copied()
    }
}

#[derive(Debug, Clone, Default)]
struct FunctionCallsData {
    return_analyzers: HashMap<StatementId, ReturnAnalyzer>,
    call_hooks: HashMap<StatementId, Vec<TermId>>,
}

/// Calling-convention facts for a set of functions, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct CallsData {
    signatures: HashMap<String, FunctionSignature>,
    functions: HashMap<String, FunctionCallsData>,
}

impl CallsData {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a function's signature.
    pub fn set_signature(&mut self, signature: FunctionSignature) {
        self.signatures.insert(signature.name.clone(), signature);
    }

    /// Returns the signature of a function, if one was reconstructed.
    pub fn signature(&self, function: &Function) -> Option<&FunctionSignature> {
        self.signatures.get(function.name())
    }

    /// Records the return analyzer for one return site of a function.
    pub fn set_return_analyzer(
        &mut self,
        function: &Function,
        ret: StatementId,
        analyzer: ReturnAnalyzer,
    ) {
        self.functions
            .entry(function.name().to_string())
            .or_default()
            .return_analyzers
            .insert(ret, analyzer);
    }

    /// Returns the return analyzer for one return site, if any.
    pub fn return_analyzer(
        &self,
        function: &Function,
        ret: StatementId,
    ) -> Option<&ReturnAnalyzer> {
        self.functions
            .get(function.name())?
            .return_analyzers
            .get(&ret)
    }

    /// Records the synthetic argument/return hook terms of a call site.
    pub fn add_call_hooks(&mut self, function: &Function, call: StatementId, terms: Vec<TermId>) {
        self.functions
            .entry(function.name().to_string())
            .or_default()
            .call_hooks
            .insert(call, terms);
    }

    /// Returns the hook terms of a call site; empty if none were recorded.
    pub fn call_hook_terms(&self, function: &Function, call: StatementId) -> &[TermId] {
        self.functions
            .get(function.name())
            .and_then(|data| data.call_hooks.get(&call))
            .map(|terms| terms.as_slice())
            .unwrap_or(&[])
    }
}
