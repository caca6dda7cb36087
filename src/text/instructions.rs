//! Assembly of instruction sequences from the text format.
//!
//! Instructions come in two forms. Plain form writes a flat sequence
//! (`local.get 0 local.get 1 i32.add`), with structured instructions closed
//! by `end`/`else` keywords. Folded form nests operands inside the operator
//! (`(i32.add (local.get 0) (local.get 1))`); the children are emitted
//! before the parent, producing the same linear sequence.

use crate::diag::DiagnosticKind;
use crate::isa::{self, Constructor, Immediate};
use crate::model::{
    BlockType, ControlInstruction, Expression, Instruction, MemoryArgument,
};
use crate::text::assemble::{Assembler, Cursor, Space};
use crate::text::context::IdentifierContext;
use crate::text::sexpr::{SExpr, SList};
use crate::text::token::TokenKind;

pub(crate) struct BodyAssembler<'a, 'log> {
    assembler: &'a mut Assembler<'log>,
    locals: IdentifierContext,
    labels: Vec<Option<String>>,
}

impl<'a, 'log> BodyAssembler<'a, 'log> {
    pub(crate) fn new(assembler: &'a mut Assembler<'log>, locals: IdentifierContext) -> Self {
        BodyAssembler {
            assembler,
            locals,
            labels: Vec::new(),
        }
    }

    /// Assembles a function body or initializer expression.
    pub(crate) fn assemble(&mut self, items: &[SExpr], parent: (usize, usize)) -> Expression {
        let mut cursor = Cursor::new(items, parent);
        let mut out = Vec::new();

        self.sequence(&mut cursor, &mut out, &[]);

        Expression::new(out)
    }

    /// Assembles instructions until a stop keyword (for plain structured
    /// instructions) or the end of the items.
    /// Returns the stop keyword that ended the sequence, if any.
    fn sequence(
        &mut self,
        cursor: &mut Cursor,
        out: &mut Vec<Instruction>,
        stop: &[&str],
    ) -> Option<String> {
        loop {
            match cursor.peek() {
                None => {
                    if !stop.is_empty() {
                        self.assembler.error_at(
                            DiagnosticKind::Syntax,
                            format!("missing `{}`", stop.join("` or `")),
                            cursor.position(),
                        );
                    }

                    return None;
                }
                Some(SExpr::List(list)) => {
                    cursor.next();
                    self.folded(list, out);
                }
                Some(SExpr::Token(token)) => match &token.kind {
                    TokenKind::Keyword(keyword) if stop.contains(&keyword.as_str()) => {
                        let keyword = keyword.clone();

                        cursor.next();
                        // An optional label may restate the block's name.
                        cursor.take_identifier();

                        return Some(keyword);
                    }
                    TokenKind::Keyword(keyword) => {
                        let keyword = keyword.clone();
                        let position = (token.line, token.column);

                        cursor.next();
                        self.plain(&keyword, position, cursor, out);
                    }
                    _ => {
                        let (position, description) =
                            ((token.line, token.column), token.describe());

                        self.assembler.error_at(
                            DiagnosticKind::Syntax,
                            format!("expected an instruction, found {description}"),
                            position,
                        );
                        cursor.next();
                    }
                },
            }
        }
    }

    /// Assembles one plain-form instruction whose mnemonic was consumed.
    fn plain(
        &mut self,
        keyword: &str,
        position: (usize, usize),
        cursor: &mut Cursor,
        out: &mut Vec<Instruction>,
    ) {
        match keyword {
            "block" | "loop" => {
                let label = cursor.take_identifier();
                let kind = self.parse_block_type(cursor);

                self.labels.push(label);

                let mut body = Vec::new();
                let closed = self.sequence(cursor, &mut body, &["end"]);

                self.labels.pop();

                if closed.is_some() {
                    let body = Expression::new(body);

                    out.push(if keyword == "block" {
                        ControlInstruction::Block(kind, body).into()
                    } else {
                        ControlInstruction::Loop(kind, body).into()
                    });
                }
            }
            "if" => {
                let label = cursor.take_identifier();
                let kind = self.parse_block_type(cursor);

                self.labels.push(label);

                let mut positive = Vec::new();
                let mut negative = None;

                match self.sequence(cursor, &mut positive, &["else", "end"]) {
                    Some(keyword) if keyword == "else" => {
                        let mut body = Vec::new();

                        self.sequence(cursor, &mut body, &["end"]);
                        negative = Some(Expression::new(body));
                    }
                    _ => {}
                }

                self.labels.pop();
                out.push(
                    ControlInstruction::If(kind, Expression::new(positive), negative).into(),
                );
            }
            "else" | "end" => {
                self.assembler.error_at(
                    DiagnosticKind::Syntax,
                    format!("`{keyword}` closes no open block"),
                    position,
                );
            }
            _ => {
                if let Some(instruction) = self.leaf_operator(keyword, position, cursor) {
                    out.push(instruction);
                }
            }
        }
    }

    /// Assembles one folded-form instruction.
    /// Operand children are emitted before the operator itself.
    fn folded(&mut self, list: &SList, out: &mut Vec<Instruction>) {
        let position = (list.line, list.column);
        let mut cursor = Cursor::new(&list.items, position);

        match list.keyword.as_str() {
            "block" | "loop" => {
                let label = cursor.take_identifier();
                let kind = self.parse_block_type(&mut cursor);

                self.labels.push(label);

                let mut body = Vec::new();

                self.sequence(&mut cursor, &mut body, &[]);
                self.labels.pop();

                let body = Expression::new(body);

                out.push(if list.keyword == "block" {
                    ControlInstruction::Block(kind, body).into()
                } else {
                    ControlInstruction::Loop(kind, body).into()
                });
            }
            "if" => {
                let label = cursor.take_identifier();
                let kind = self.parse_block_type(&mut cursor);

                // Folded conditions precede the `then` clause and execute
                // before the if itself.
                while let Some(SExpr::List(sub)) = cursor.peek() {
                    if sub.keyword == "then" || sub.keyword == "else" {
                        break;
                    }

                    cursor.next();
                    self.folded(sub, out);
                }

                self.labels.push(label);

                let positive = match cursor.take_list("then") {
                    Some(then) => {
                        let mut inner = Cursor::new(&then.items, (then.line, then.column));
                        let mut body = Vec::new();

                        self.sequence(&mut inner, &mut body, &[]);

                        Expression::new(body)
                    }
                    None => {
                        self.assembler.error_at(
                            DiagnosticKind::Syntax,
                            "folded `if` requires a `(then …)` clause".to_string(),
                            position,
                        );

                        Expression::empty()
                    }
                };

                let negative = cursor.take_list("else").map(|clause| {
                    let mut inner = Cursor::new(&clause.items, (clause.line, clause.column));
                    let mut body = Vec::new();

                    self.sequence(&mut inner, &mut body, &[]);

                    Expression::new(body)
                });

                self.labels.pop();

                if let Some(extra) = cursor.next() {
                    let (line, column) = extra.position();

                    self.assembler.error_at(
                        DiagnosticKind::Syntax,
                        format!("unexpected {} after `else`", extra.describe()),
                        (line, column),
                    );
                }

                out.push(ControlInstruction::If(kind, positive, negative).into());
            }
            _ => {
                let instruction = self.leaf_operator(&list.keyword, position, &mut cursor);

                while let Some(item) = cursor.next() {
                    match item {
                        SExpr::List(sub) => self.folded(sub, out),
                        SExpr::Token(token) => {
                            let (position, description) =
                                ((token.line, token.column), token.describe());

                            self.assembler.error_at(
                                DiagnosticKind::Syntax,
                                format!("expected a folded instruction, found {description}"),
                                position,
                            );
                        }
                    }
                }

                if let Some(instruction) = instruction {
                    out.push(instruction);
                }
            }
        }
    }

    /// Assembles a non-structured operator and its immediates.
    fn leaf_operator(
        &mut self,
        keyword: &str,
        position: (usize, usize),
        cursor: &mut Cursor,
    ) -> Option<Instruction> {
        match keyword {
            "br_table" => {
                let mut targets = Vec::new();

                while self.peek_label(cursor) {
                    targets.push(self.label_immediate(cursor, position));
                }

                match targets.pop() {
                    Some(default) => {
                        Some(ControlInstruction::BranchTable(targets, default).into())
                    }
                    None => {
                        self.assembler.error_at(
                            DiagnosticKind::Syntax,
                            "`br_table` requires at least a default label".to_string(),
                            position,
                        );

                        Some(ControlInstruction::BranchTable(Vec::new(), 0).into())
                    }
                }
            }
            "call_indirect" => {
                let (kind, _) = self.assembler.parse_type_use(cursor);

                Some(ControlInstruction::CallIndirect(kind).into())
            }
            _ => match isa::by_text_mnemonic(keyword) {
                None => {
                    self.assembler.error_at(
                        DiagnosticKind::Syntax,
                        format!("unknown instruction mnemonic `{keyword}`"),
                        position,
                    );

                    None
                }
                Some(operator) => match operator.constructor {
                    Constructor::Fixed(build) => Some(build()),
                    Constructor::Index(build) => {
                        let index = match operator.immediate {
                            Immediate::Local => self.local_immediate(cursor, position),
                            Immediate::Label => self.label_immediate(cursor, position),
                            Immediate::Global => self.module_index(cursor, Space::Global, position),
                            Immediate::Function => {
                                self.module_index(cursor, Space::Function, position)
                            }
                            _ => self.module_index(cursor, Space::Type, position),
                        };

                        Some(build(index))
                    }
                    Constructor::I32(build) => Some(build(self.i32_immediate(cursor, position))),
                    Constructor::I64(build) => Some(build(self.i64_immediate(cursor, position))),
                    Constructor::F32(build) => Some(build(self.f32_immediate(cursor, position))),
                    Constructor::F64(build) => Some(build(self.f64_immediate(cursor, position))),
                    Constructor::Memory(build) => {
                        let natural = match operator.immediate {
                            Immediate::Memory(exponent) => exponent,
                            _ => 0,
                        };

                        Some(build(self.memory_immediate(cursor, natural)))
                    }
                    Constructor::Structured => {
                        self.assembler.error_at(
                            DiagnosticKind::Syntax,
                            format!("`{keyword}` cannot appear here"),
                            position,
                        );

                        None
                    }
                },
            },
        }
    }

    /// Parses an optional `(result valtype)` block type.
    fn parse_block_type(&mut self, cursor: &mut Cursor) -> BlockType {
        match cursor.take_list("result") {
            None => BlockType::Empty,
            Some(result) => {
                let mut inner = Cursor::new(&result.items, (result.line, result.column));
                let kind = self.assembler.take_value_type(&mut inner, "block result type");

                if inner.peek().is_some() {
                    self.assembler.error_at(
                        DiagnosticKind::Syntax,
                        "a block may produce at most one value".to_string(),
                        (result.line, result.column),
                    );
                }

                BlockType::Value(kind)
            }
        }
    }

    fn peek_label(&self, cursor: &Cursor) -> bool {
        matches!(
            cursor.peek(),
            Some(SExpr::Token(token))
                if matches!(
                    token.kind,
                    TokenKind::UnsignedInteger(_) | TokenKind::Identifier(_)
                )
        )
    }

    /// Resolves a branch target: a numeric depth,
    /// or a label name matched by walking the enclosing blocks innermost
    /// first.
    fn label_immediate(&mut self, cursor: &mut Cursor, position: (usize, usize)) -> u32 {
        match cursor.peek() {
            Some(SExpr::Token(token)) => match &token.kind {
                TokenKind::UnsignedInteger(value) => {
                    let value = *value;
                    let position = (token.line, token.column);

                    cursor.next();

                    if value > u32::MAX as u128 {
                        self.assembler.error_at(
                            DiagnosticKind::Syntax,
                            format!("label depth {value} is out of range"),
                            position,
                        );

                        return 0;
                    }

                    value as u32
                }
                TokenKind::Identifier(name) => {
                    let name = name.clone();
                    let position = (token.line, token.column);

                    cursor.next();

                    match self
                        .labels
                        .iter()
                        .rev()
                        .position(|label| label.as_deref() == Some(name.as_str()))
                    {
                        Some(depth) => depth as u32,
                        None => {
                            self.assembler.error_at(
                                DiagnosticKind::UnresolvedIdentifier,
                                format!("label `${name}` is not in scope"),
                                position,
                            );

                            0
                        }
                    }
                }
                _ => {
                    self.missing_immediate("a label", position);

                    0
                }
            },
            _ => {
                self.missing_immediate("a label", position);

                0
            }
        }
    }

    fn local_immediate(&mut self, cursor: &mut Cursor, position: (usize, usize)) -> u32 {
        match cursor.peek() {
            Some(SExpr::Token(token)) => match &token.kind {
                TokenKind::UnsignedInteger(value) => {
                    let value = *value;
                    let position = (token.line, token.column);

                    cursor.next();

                    if value > u32::MAX as u128 {
                        self.assembler.error_at(
                            DiagnosticKind::Syntax,
                            format!("local index {value} is out of range"),
                            position,
                        );

                        return 0;
                    }

                    value as u32
                }
                TokenKind::Identifier(name) => {
                    let name = name.clone();
                    let position = (token.line, token.column);

                    cursor.next();

                    match self.locals.resolve(&name) {
                        Some(index) => index,
                        None => {
                            let suggestion = self
                                .locals
                                .suggest(&name)
                                .map(|candidate| format!("; did you mean `${candidate}`?"))
                                .unwrap_or_default();

                            self.assembler.error_at(
                                DiagnosticKind::UnresolvedIdentifier,
                                format!("local `${name}` is not defined{suggestion}"),
                                position,
                            );

                            0
                        }
                    }
                }
                _ => {
                    self.missing_immediate("a local index", position);

                    0
                }
            },
            _ => {
                self.missing_immediate("a local index", position);

                0
            }
        }
    }

    fn module_index(
        &mut self,
        cursor: &mut Cursor,
        space: Space,
        position: (usize, usize),
    ) -> u32 {
        match self.assembler.optional_index_use(cursor, space) {
            Some(index) => index,
            None => {
                self.missing_immediate("an index", position);

                0
            }
        }
    }

    fn i32_immediate(&mut self, cursor: &mut Cursor, position: (usize, usize)) -> i32 {
        match cursor.peek() {
            Some(SExpr::Token(token)) => {
                let token_position = (token.line, token.column);

                match &token.kind {
                    TokenKind::UnsignedInteger(value) => {
                        let value = *value;

                        cursor.next();

                        if value > u32::MAX as u128 {
                            self.assembler.error_at(
                                DiagnosticKind::Syntax,
                                format!("`{value}` does not fit in 32 bits"),
                                token_position,
                            );

                            return 0;
                        }

                        value as u32 as i32
                    }
                    TokenKind::SignedInteger(value) => {
                        let value = *value;

                        cursor.next();

                        if value < i32::MIN as i128 || value > i32::MAX as i128 {
                            self.assembler.error_at(
                                DiagnosticKind::Syntax,
                                format!("`{value}` does not fit in 32 bits"),
                                token_position,
                            );

                            return 0;
                        }

                        value as i32
                    }
                    _ => {
                        self.missing_immediate("an i32 literal", position);

                        0
                    }
                }
            }
            _ => {
                self.missing_immediate("an i32 literal", position);

                0
            }
        }
    }

    fn i64_immediate(&mut self, cursor: &mut Cursor, position: (usize, usize)) -> i64 {
        match cursor.peek() {
            Some(SExpr::Token(token)) => {
                let token_position = (token.line, token.column);

                match &token.kind {
                    TokenKind::UnsignedInteger(value) => {
                        let value = *value;

                        cursor.next();

                        if value > u64::MAX as u128 {
                            self.assembler.error_at(
                                DiagnosticKind::Syntax,
                                format!("`{value}` does not fit in 64 bits"),
                                token_position,
                            );

                            return 0;
                        }

                        value as u64 as i64
                    }
                    TokenKind::SignedInteger(value) => {
                        let value = *value;

                        cursor.next();

                        if value < i64::MIN as i128 || value > i64::MAX as i128 {
                            self.assembler.error_at(
                                DiagnosticKind::Syntax,
                                format!("`{value}` does not fit in 64 bits"),
                                token_position,
                            );

                            return 0;
                        }

                        value as i64
                    }
                    _ => {
                        self.missing_immediate("an i64 literal", position);

                        0
                    }
                }
            }
            _ => {
                self.missing_immediate("an i64 literal", position);

                0
            }
        }
    }

    fn f32_immediate(&mut self, cursor: &mut Cursor, position: (usize, usize)) -> f32 {
        match cursor.peek() {
            Some(SExpr::Token(token)) => {
                let token_position = (token.line, token.column);

                match &token.kind {
                    TokenKind::Float(literal) => {
                        let literal = literal.clone();

                        cursor.next();

                        match literal.to_f32() {
                            Some(value) => value,
                            None => {
                                self.assembler.error_at(
                                    DiagnosticKind::Syntax,
                                    "float literal is not representable as f32".to_string(),
                                    token_position,
                                );

                                0.0
                            }
                        }
                    }
                    TokenKind::UnsignedInteger(value) => {
                        let value = *value;

                        cursor.next();

                        value as f32
                    }
                    TokenKind::SignedInteger(value) => {
                        let value = *value;

                        cursor.next();

                        value as f32
                    }
                    _ => {
                        self.missing_immediate("an f32 literal", position);

                        0.0
                    }
                }
            }
            _ => {
                self.missing_immediate("an f32 literal", position);

                0.0
            }
        }
    }

    fn f64_immediate(&mut self, cursor: &mut Cursor, position: (usize, usize)) -> f64 {
        match cursor.peek() {
            Some(SExpr::Token(token)) => {
                let token_position = (token.line, token.column);

                match &token.kind {
                    TokenKind::Float(literal) => {
                        let literal = literal.clone();

                        cursor.next();

                        match literal.to_f64() {
                            Some(value) => value,
                            None => {
                                self.assembler.error_at(
                                    DiagnosticKind::Syntax,
                                    "float literal is not representable as f64".to_string(),
                                    token_position,
                                );

                                0.0
                            }
                        }
                    }
                    TokenKind::UnsignedInteger(value) => {
                        let value = *value;

                        cursor.next();

                        value as f64
                    }
                    TokenKind::SignedInteger(value) => {
                        let value = *value;

                        cursor.next();

                        value as f64
                    }
                    _ => {
                        self.missing_immediate("an f64 literal", position);

                        0.0
                    }
                }
            }
            _ => {
                self.missing_immediate("an f64 literal", position);

                0.0
            }
        }
    }

    /// Parses the optional `offset=` and `align=` keywords of a memory
    /// access. The alignment defaults to the access's natural alignment and
    /// must be a power of two.
    fn memory_immediate(&mut self, cursor: &mut Cursor, natural: u32) -> MemoryArgument {
        let mut offset = 0;
        let mut align = natural;

        while let Some(SExpr::Token(token)) = cursor.peek() {
            let keyword = match &token.kind {
                TokenKind::Keyword(keyword) => keyword.clone(),
                _ => break,
            };
            let position = (token.line, token.column);

            if let Some(text) = keyword.strip_prefix("offset=") {
                cursor.next();
                offset = self.annotated_number(text, position);
            } else if let Some(text) = keyword.strip_prefix("align=") {
                cursor.next();

                let bytes = self.annotated_number(text, position);

                if bytes.is_power_of_two() {
                    align = bytes.trailing_zeros();
                } else {
                    self.assembler.error_at(
                        DiagnosticKind::Syntax,
                        format!("alignment {bytes} is not a power of two"),
                        position,
                    );
                }
            } else {
                break;
            }
        }

        MemoryArgument::new(align, offset)
    }

    /// Parses the numeric part of an `offset=`/`align=` keyword.
    fn annotated_number(&mut self, text: &str, position: (usize, usize)) -> u32 {
        let normalized: String = text.chars().filter(|&c| c != '_').collect();
        let parsed = match normalized.strip_prefix("0x") {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => normalized.parse(),
        };

        match parsed {
            Ok(value) => value,
            Err(_) => {
                self.assembler.error_at(
                    DiagnosticKind::Syntax,
                    format!("`{text}` is not a valid unsigned integer"),
                    position,
                );

                0
            }
        }
    }

    /// A missing immediate reports one diagnostic and substitutes zero,
    /// so assembly continues to surface further errors.
    fn missing_immediate(&mut self, what: &str, position: (usize, usize)) {
        self.assembler.error_at(
            DiagnosticKind::Syntax,
            format!("expected {what}"),
            position,
        );
    }
}
