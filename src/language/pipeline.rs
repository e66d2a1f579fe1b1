use crate::language::cexpr::CExpr;
use crate::language::errors::SyntaxErrors;
use crate::language::fresh::FreshIds;
use crate::language::lift::{self, HoistPolicy};
use crate::language::span::LineMap;
use crate::language::tags::TagTable;
use crate::language::{flatness, hygiene, normalize, parser};
use std::cell::RefCell;
use std::rc::Rc;

/// Pass order is fixed: parse, hygiene renaming, lowering to the IR,
/// function hoisting, flatness marking. Each pass is a pure tree-to-tree
/// function; the tag table is the only state carried between them.
#[derive(Clone, Copy, Debug)]
pub struct CompileOptions {
    pub policy: HoistPolicy,
    pub lift: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            policy: HoistPolicy::Local,
            lift: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CompiledProgram {
    pub body: Rc<CExpr>,
    pub tags: TagTable,
}

pub fn compile(source: &str) -> Result<CompiledProgram, SyntaxErrors> {
    compile_with(source, CompileOptions::default())
}

pub fn compile_with(
    source: &str,
    options: CompileOptions,
) -> Result<CompiledProgram, SyntaxErrors> {
    let program = parser::parse(source)?;
    let fresh = Rc::new(RefCell::new(FreshIds::new()));
    let renamed = hygiene::rename_program(&program, &mut fresh.borrow_mut());
    let tags = Rc::new(RefCell::new(TagTable::new()));
    let lines = Rc::new(LineMap::new(source));
    let lowered = normalize::lower(&renamed, &fresh, &tags, &lines);
    let body = if options.lift {
        lift::raise_funs(&lowered, options.policy)
    } else {
        lowered
    };
    let mut tags = tags.take();
    flatness::mark(&body, &mut tags);
    Ok(CompiledProgram {
        body: Rc::new(body),
        tags,
    })
}
