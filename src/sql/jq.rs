//! jq filter adapter over the jaq interpreter.
//!
//! A filter is compiled against the core and standard library
//! definitions, run on the input value, and every output it produces is
//! collected into a sequence. Compile and run failures abort the query.

use anyhow::{Result, anyhow, bail};
use jaq_interpret::{Ctx, FilterT, ParseCtx, RcIter, Val};
use serde_json::Value;

pub fn run(program: &str, input: &Value) -> Result<Value> {
    let mut defs = ParseCtx::new(Vec::new());
    defs.insert_natives(jaq_core::core());
    defs.insert_defs(jaq_std::std());

    let (main, errs) = jaq_parse::parse(program, jaq_parse::main());
    if let Some(err) = errs.first() {
        bail!("jq error in {program:?}: {err}");
    }
    let main = main.ok_or_else(|| anyhow!("jq error in {program:?}: empty filter"))?;

    let filter = defs.compile(main);
    if !defs.errs.is_empty() {
        bail!("jq error in {program:?}: undefined names");
    }

    let inputs = RcIter::new(core::iter::empty());
    let mut outputs = Vec::new();
    for output in filter.run((Ctx::new([], &inputs), Val::from(input.clone()))) {
        let val = output.map_err(|e| anyhow!("jq error in {program:?}: {e}"))?;
        outputs.push(Value::from(val));
    }

    Ok(Value::Array(outputs))
}
