use std::collections::BTreeMap;

use crate::error::ProcedureError;

pub type ProcedureResult = Result<String, ProcedureError>;

/// A named function callable from a template with `$call name args...`.
///
/// Arguments arrive already rendered, in source order. Plain closures of the
/// form `Fn(&[String]) -> String` are procedures; implement the trait directly
/// for procedures that can fail.
pub trait Procedure {
    fn call(&self, args: &[String]) -> ProcedureResult;
}

impl<F> Procedure for F
where
    F: Fn(&[String]) -> String,
{
    fn call(&self, args: &[String]) -> ProcedureResult {
        Ok(self(args))
    }
}

/// The procedure table handed to a single render.
///
/// Procedures may borrow from the caller for `'p`, e.g. to collect
/// attachments produced while rendering.
#[derive(Default)]
pub struct Procedures<'p> {
    table: BTreeMap<String, Box<dyn Procedure + 'p>>,
}

impl<'p> Procedures<'p> {
    pub fn new() -> Self {
        Self {
            table: BTreeMap::new(),
        }
    }

    /// A table holding the standard procedures, `format` and `upper`.
    pub fn standard() -> Self {
        let mut procedures = Self::new();
        procedures.insert_standard();
        procedures
    }

    /// Registers the standard procedures, replacing any with the same names.
    pub fn insert_standard(&mut self) -> &mut Self {
        self.insert("format", crate::builtins::Format)
            .insert("upper", crate::builtins::upper)
    }

    pub fn insert<N, P>(&mut self, name: N, procedure: P) -> &mut Self
    where
        N: AsRef<str>,
        P: Procedure + 'p,
    {
        self.table
            .insert(name.as_ref().to_string(), Box::new(procedure));
        self
    }

    pub fn get<N: AsRef<str>>(&self, name: N) -> Option<&(dyn Procedure + 'p)> {
        self.table.get(name.as_ref()).map(|procedure| procedure.as_ref())
    }

    pub fn contains<N: AsRef<str>>(&self, name: N) -> bool {
        self.table.contains_key(name.as_ref())
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Procedures<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct Failing;

    impl Procedure for Failing {
        fn call(&self, _args: &[String]) -> ProcedureResult {
            Err(ProcedureError::new("always fails"))
        }
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_closures_are_procedures() {
        let mut procedures = Procedures::new();
        procedures.insert("join", |args: &[String]| args.join("+"));

        let join = procedures.get("join").unwrap();
        let args = vec!["a".to_string(), "b".to_string()];
        assert_eq!(join.call(&args), Ok("a+b".to_string()));
        assert!(procedures.get("missing").is_none());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_fallible_procedure() {
        let mut procedures = Procedures::new();
        procedures.insert("fail", Failing);
        assert_eq!(
            procedures.get("fail").unwrap().call(&[]),
            Err(ProcedureError::new("always fails"))
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_procedures_can_borrow_caller_state() {
        let calls = Cell::new(0_usize);
        {
            let mut procedures = Procedures::new();
            procedures.insert("count", |_: &[String]| {
                calls.set(calls.get().saturating_add(1));
                format!("image{}", calls.get())
            });
            let count = procedures.get("count").unwrap();
            assert_eq!(count.call(&[]).unwrap(), "image1");
            assert_eq!(count.call(&[]).unwrap(), "image2");
        }
        assert_eq!(calls.get(), 2);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_standard_table() {
        let procedures = Procedures::standard();
        assert_eq!(procedures.len(), 2);
        assert_eq!(procedures.names().collect::<Vec<_>>(), vec!["format", "upper"]);
        assert_eq!(format!("{:?}", procedures), r#"{"format", "upper"}"#);
    }
}
