//! Single-pass compiler from the AST to a bytecode [`Module`].
//!
//! Every identifier resolves to a local slot, an upvalue slot, or a global
//! slot. Jump operands are absolute indices into the containing function's
//! instruction vector; forward jumps are emitted with a placeholder and
//! patched once the target is known.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::ast::{
    AssignTarget, BinaryOp, ClassDecl, Expr, FunctionDecl, Literal, MatchArm, Parameter, Pattern,
    Program, Stmt, UnaryOp,
};
use crate::tokenizer::Position;

use super::bytecode::{ClassConstant, Constant, FunctionProto, Module, UpvalueDesc};
use super::instruction::{Instruction, Opcode};

/// Compile-time failure: redeclaration, an unsupported construct, or an
/// internal limit.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} at {line}:{column}")]
pub struct CompileError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl CompileError {
    fn new(message: impl Into<String>, position: &Position) -> Self {
        Self {
            message: message.into(),
            line: position.line,
            column: position.column,
        }
    }
}

type CompileResult<T> = Result<T, CompileError>;

/// Compile a parsed program into a bytecode module.
pub fn compile_program(program: &Program) -> CompileResult<Module> {
    let mut compiler = Compiler::default();
    compiler.push_context("<main>");
    for stmt in &program.statements {
        compiler.compile_stmt(stmt)?;
    }
    let main = compiler.finish_context();
    debug!(
        constants = compiler.constants.len(),
        globals = compiler.globals.len(),
        functions = compiler.functions.len(),
        "compiled module"
    );
    Ok(Module {
        constants: compiler.constants,
        globals: compiler.globals,
        functions: compiler.functions,
        main_code: main.code,
    })
}

/// Where a name resolved.
enum Resolution {
    Local(u32),
    Upvalue(u32),
    Global(u32),
}

/// Per-function compilation state.
struct FunctionContext {
    name: String,
    code: Vec<Instruction>,
    scopes: Vec<HashMap<String, u32>>,
    next_slot: u32,
    local_count: u32,
    param_count: u32,
    upvalues: Vec<UpvalueDesc>,
    upvalue_names: Vec<String>,
}

impl FunctionContext {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            code: Vec::new(),
            scopes: vec![HashMap::new()],
            next_slot: 0,
            local_count: 0,
            param_count: 0,
            upvalues: Vec::new(),
            upvalue_names: Vec::new(),
        }
    }

    fn lookup_local(&self, name: &str) -> Option<u32> {
        for scope in self.scopes.iter().rev() {
            if let Some(slot) = scope.get(name) {
                return Some(*slot);
            }
        }
        None
    }

    fn lookup_upvalue(&self, name: &str) -> Option<u32> {
        self.upvalue_names
            .iter()
            .position(|existing| existing == name)
            .map(|index| index as u32)
    }
}

#[derive(Default)]
struct Compiler {
    constants: Vec<Constant>,
    globals: Vec<String>,
    global_indices: HashMap<String, u32>,
    functions: Vec<FunctionProto>,
    contexts: Vec<FunctionContext>,
    lambda_counter: usize,
}

impl Compiler {
    // ───── context management ─────

    fn push_context(&mut self, name: &str) {
        self.contexts.push(FunctionContext::new(name));
    }

    /// Closes the current context with the implicit `none`/`RETURN`
    /// terminator. Duplicate terminators are harmless; the VM never reaches
    /// them.
    fn finish_context(&mut self) -> FunctionContext {
        let none_index = self.constant_index(Constant::None);
        self.emit(Instruction::new(Opcode::LoadConst, none_index));
        self.emit(Instruction::simple(Opcode::Return));
        self.contexts.pop().expect("context stack not empty")
    }

    fn context(&mut self) -> &mut FunctionContext {
        self.contexts.last_mut().expect("context stack not empty")
    }

    // ───── emission helpers ─────

    fn emit(&mut self, instruction: Instruction) {
        self.context().code.push(instruction);
    }

    fn emit_op(&mut self, opcode: Opcode) {
        self.emit(Instruction::simple(opcode));
    }

    /// Emits a jump with a placeholder target; returns the instruction
    /// index for later patching.
    fn emit_jump(&mut self, opcode: Opcode) -> usize {
        let index = self.context().code.len();
        self.emit(Instruction::new(opcode, 0));
        index
    }

    /// Points the jump at `index` to the next emitted instruction.
    fn patch_jump(&mut self, index: usize) {
        let target = self.context().code.len() as u32;
        if let Some(instruction) = self.context().code.get_mut(index) {
            instruction.arg = target;
        }
    }

    // ───── tables ─────

    /// Interns a constant. Primitives are deduplicated by value equality;
    /// functions and classes always get fresh entries.
    fn constant_index(&mut self, constant: Constant) -> u32 {
        let dedup = matches!(
            constant,
            Constant::None
                | Constant::Int(_)
                | Constant::Float(_)
                | Constant::Str(_)
                | Constant::Bool(_)
        );
        if dedup {
            if let Some(index) = self.constants.iter().position(|c| c == &constant) {
                return index as u32;
            }
        }
        let index = self.constants.len();
        self.constants.push(constant);
        index as u32
    }

    fn string_constant(&mut self, value: &str) -> u32 {
        self.constant_index(Constant::Str(value.to_string()))
    }

    fn literal_constant(&mut self, literal: &Literal) -> u32 {
        let constant = match literal {
            Literal::Integer(value) => Constant::Int(*value),
            Literal::Float(value) => Constant::Float(*value),
            Literal::Str(value) => Constant::Str(value.clone()),
            Literal::Boolean(value) => Constant::Bool(*value),
            Literal::None => Constant::None,
        };
        self.constant_index(constant)
    }

    /// Global slot for `name`, created on first sight. Forward references
    /// work because the slot exists before anything is stored into it.
    fn global_slot(&mut self, name: &str) -> u32 {
        if let Some(index) = self.global_indices.get(name) {
            return *index;
        }
        let index = self.globals.len() as u32;
        self.globals.push(name.to_string());
        self.global_indices.insert(name.to_string(), index);
        index
    }

    // ───── name resolution ─────

    fn resolve(&mut self, name: &str) -> Resolution {
        let top = self.contexts.len() - 1;
        if let Some(slot) = self.contexts[top].lookup_local(name) {
            return Resolution::Local(slot);
        }
        if let Some(index) = self.contexts[top].lookup_upvalue(name) {
            return Resolution::Upvalue(index);
        }
        if let Some(index) = self.resolve_upvalue(top, name) {
            return Resolution::Upvalue(index);
        }
        Resolution::Global(self.global_slot(name))
    }

    /// Walks outward looking for a capturable binding, appending upvalue
    /// descriptors on every level of the chain until grounded in a local.
    fn resolve_upvalue(&mut self, level: usize, name: &str) -> Option<u32> {
        if level == 0 {
            return None;
        }
        let parent = level - 1;
        if let Some(slot) = self.contexts[parent].lookup_local(name) {
            return Some(self.add_upvalue(level, name, true, slot));
        }
        if let Some(existing) = self.contexts[parent].lookup_upvalue(name) {
            return Some(self.add_upvalue(level, name, false, existing));
        }
        if let Some(chained) = self.resolve_upvalue(parent, name) {
            return Some(self.add_upvalue(level, name, false, chained));
        }
        None
    }

    fn add_upvalue(&mut self, level: usize, name: &str, is_local: bool, parent_index: u32) -> u32 {
        let ctx = &mut self.contexts[level];
        for (index, upvalue) in ctx.upvalues.iter().enumerate() {
            if upvalue.is_local == is_local && upvalue.parent_index == parent_index {
                return index as u32;
            }
        }
        ctx.upvalues.push(UpvalueDesc {
            is_local,
            parent_index,
        });
        ctx.upvalue_names.push(name.to_string());
        (ctx.upvalues.len() - 1) as u32
    }

    fn begin_scope(&mut self) {
        self.context().scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.context().scopes.pop();
    }

    fn declare_local(&mut self, name: &str, position: &Position) -> CompileResult<u32> {
        let ctx = self.context();
        let scope = ctx.scopes.last_mut().expect("scope stack not empty");
        if scope.contains_key(name) {
            return Err(CompileError::new(
                format!("'{}' is already declared in this scope", name),
                position,
            ));
        }
        let slot = ctx.next_slot;
        scope.insert(name.to_string(), slot);
        ctx.next_slot += 1;
        ctx.local_count = ctx.local_count.max(ctx.next_slot);
        Ok(slot)
    }

    // ───── statements ─────

    fn compile_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::VariableDecl { decl } => {
                let slot = self.declare_local(&decl.name, &decl.position)?;
                self.compile_expr(&decl.initializer)?;
                self.emit(Instruction::new(Opcode::StoreVar, slot));
                Ok(())
            }
            Stmt::FunctionDecl { decl } => {
                let proto = self.compile_function(
                    &decl.name,
                    &decl.params,
                    &decl.body,
                    false,
                )?;
                self.load_function_value(proto);
                let slot = self.global_slot(&decl.name);
                self.emit(Instruction::new(Opcode::StoreGlobal, slot));
                Ok(())
            }
            Stmt::ClassDecl { decl } => self.compile_class(decl),
            Stmt::DataDecl { name, fields, .. } => {
                let class = ClassConstant {
                    name: name.clone(),
                    fields: fields.iter().map(|field| field.name.clone()).collect(),
                    methods: Vec::new(),
                };
                let index = self.constant_index(Constant::Class(class));
                self.emit(Instruction::new(Opcode::LoadConst, index));
                let slot = self.global_slot(name);
                self.emit(Instruction::new(Opcode::StoreGlobal, slot));
                Ok(())
            }
            Stmt::TraitDecl { position, .. } => Err(CompileError::new(
                "trait declarations are not supported by the bytecode core",
                position,
            )),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => self.compile_if(condition, then_branch, else_branch.as_deref()),
            Stmt::While {
                condition, body, ..
            } => self.compile_while(condition, body),
            Stmt::ForIn { position, .. } => Err(CompileError::new(
                "for-in loops require an iterator protocol and are not supported",
                position,
            )),
            Stmt::Match { subject, arms, .. } => self.compile_match(subject, arms),
            Stmt::Return { value, .. } => {
                match value {
                    Some(expr) => self.compile_expr(expr)?,
                    None => {
                        let index = self.constant_index(Constant::None);
                        self.emit(Instruction::new(Opcode::LoadConst, index));
                    }
                }
                self.emit_op(Opcode::Return);
                Ok(())
            }
            // Parsed but deliberately inert: loops cannot yet be broken
            // out of early.
            Stmt::Break { .. } | Stmt::Continue { .. } => Ok(()),
            Stmt::Expression { expr } => {
                self.compile_expr(expr)?;
                self.emit_op(Opcode::Pop);
                Ok(())
            }
            Stmt::Block { statements, .. } => {
                self.begin_scope();
                for stmt in statements {
                    self.compile_stmt(stmt)?;
                }
                self.end_scope();
                Ok(())
            }
        }
    }

    fn compile_if(
        &mut self,
        condition: &Expr,
        then_branch: &[Stmt],
        else_branch: Option<&Stmt>,
    ) -> CompileResult<()> {
        self.compile_expr(condition)?;
        let jump_to_else = self.emit_jump(Opcode::JumpIfFalse);
        self.begin_scope();
        for stmt in then_branch {
            self.compile_stmt(stmt)?;
        }
        self.end_scope();
        let jump_to_end = self.emit_jump(Opcode::Jump);
        self.patch_jump(jump_to_else);
        if let Some(else_branch) = else_branch {
            self.compile_stmt(else_branch)?;
        }
        self.patch_jump(jump_to_end);
        Ok(())
    }

    fn compile_while(&mut self, condition: &Expr, body: &[Stmt]) -> CompileResult<()> {
        let loop_start = self.context().code.len() as u32;
        self.compile_expr(condition)?;
        let exit_jump = self.emit_jump(Opcode::JumpIfFalse);
        self.begin_scope();
        for stmt in body {
            self.compile_stmt(stmt)?;
        }
        self.end_scope();
        self.emit(Instruction::new(Opcode::Jump, loop_start));
        self.patch_jump(exit_jump);
        Ok(())
    }

    /// Match lowering: the subject stays on the stack while arms test
    /// duplicated copies of it. Each successful arm pushes its body value
    /// and jumps to the shared end; a fallthrough pushes `none`. Both the
    /// value and the subject copy are popped afterwards.
    fn compile_match(&mut self, subject: &Expr, arms: &[MatchArm]) -> CompileResult<()> {
        self.compile_expr(subject)?;
        let mut end_jumps = Vec::new();

        for arm in arms {
            self.begin_scope();
            let mut fail_jumps = Vec::new();

            match &arm.pattern {
                Pattern::Wildcard => {}
                Pattern::Literal(literal) => {
                    self.emit_op(Opcode::Dup);
                    let index = self.literal_constant(literal);
                    self.emit(Instruction::new(Opcode::LoadConst, index));
                    self.emit_op(Opcode::Eq);
                    fail_jumps.push(self.emit_jump(Opcode::JumpIfFalse));
                }
                // The binding is stored before the guard runs, so it is
                // visible to both the guard and the body.
                Pattern::Identifier(name) => {
                    self.emit_op(Opcode::Dup);
                    let slot = self.declare_local(name, &arm.position)?;
                    self.emit(Instruction::new(Opcode::StoreVar, slot));
                }
                Pattern::Range { lo, hi } => {
                    self.emit_op(Opcode::Dup);
                    let lo_index = self.literal_constant(lo);
                    self.emit(Instruction::new(Opcode::LoadConst, lo_index));
                    self.emit_op(Opcode::Ge);
                    fail_jumps.push(self.emit_jump(Opcode::JumpIfFalse));
                    self.emit_op(Opcode::Dup);
                    let hi_index = self.literal_constant(hi);
                    self.emit(Instruction::new(Opcode::LoadConst, hi_index));
                    self.emit_op(Opcode::Lt);
                    fail_jumps.push(self.emit_jump(Opcode::JumpIfFalse));
                }
                Pattern::Constructor { .. } => {
                    return Err(CompileError::new(
                        "constructor patterns are not supported by the bytecode core",
                        &arm.position,
                    ));
                }
            }

            if let Some(guard) = &arm.guard {
                self.compile_expr(guard)?;
                fail_jumps.push(self.emit_jump(Opcode::JumpIfFalse));
            }

            self.compile_expr(&arm.body)?;
            end_jumps.push(self.emit_jump(Opcode::Jump));

            for jump in fail_jumps {
                self.patch_jump(jump);
            }
            self.end_scope();
        }

        // No arm matched.
        let none_index = self.constant_index(Constant::None);
        self.emit(Instruction::new(Opcode::LoadConst, none_index));

        for jump in end_jumps {
            self.patch_jump(jump);
        }
        self.emit_op(Opcode::Pop); // arm value
        self.emit_op(Opcode::Pop); // subject copy
        Ok(())
    }

    // ───── functions and classes ─────

    /// Compiles a function body in a nested context and returns its proto.
    /// When `method` is set, slot 0 is the implicit receiver.
    fn compile_function(
        &mut self,
        name: &str,
        params: &[Parameter],
        body: &[Stmt],
        method: bool,
    ) -> CompileResult<FunctionProto> {
        self.push_context(name);
        if method {
            let receiver_position = Position::new(0, 0, 0);
            self.declare_local("self", &receiver_position)?;
        }
        for param in params {
            self.declare_local(&param.name, &param.position)?;
        }
        let arity = params.len() as u32 + method as u32;
        self.context().param_count = arity;

        for stmt in body {
            self.compile_stmt(stmt)?;
        }

        let ctx = self.finish_context();
        Ok(FunctionProto {
            name: ctx.name,
            arity,
            local_count: ctx.local_count,
            upvalues: ctx.upvalues,
            code: ctx.code,
        })
    }

    /// Registers the proto in the functions table, then emits the constant
    /// load (wrapped in `MAKE_CLOSURE` when the function captures).
    fn load_function_value(&mut self, proto: FunctionProto) {
        let upvalue_count = proto.upvalue_count();
        self.functions.push(proto.clone());
        let index = self.constant_index(Constant::Function(proto));
        self.emit(Instruction::new(Opcode::LoadConst, index));
        if upvalue_count > 0 {
            self.emit(Instruction::new(Opcode::MakeClosure, upvalue_count));
        }
    }

    /// Methods compile in a detached context stack: enclosing locals are
    /// not capturable from a method body, so unresolved names fall through
    /// to globals.
    fn compile_class(&mut self, decl: &ClassDecl) -> CompileResult<()> {
        let saved_contexts = std::mem::take(&mut self.contexts);

        let mut methods = Vec::new();
        let mut result = Ok(());
        for method in &decl.methods {
            match self.compile_function(&method.name, &method.params, &method.body, true) {
                Ok(proto) => {
                    self.functions.push(proto.clone());
                    methods.push((method.name.clone(), proto));
                }
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        self.contexts = saved_contexts;
        result?;

        let class = ClassConstant {
            name: decl.name.clone(),
            fields: decl.fields.iter().map(|field| field.name.clone()).collect(),
            methods,
        };
        let index = self.constant_index(Constant::Class(class));
        self.emit(Instruction::new(Opcode::LoadConst, index));
        let slot = self.global_slot(&decl.name);
        self.emit(Instruction::new(Opcode::StoreGlobal, slot));
        Ok(())
    }

    // ───── expressions ─────

    fn compile_expr(&mut self, expr: &Expr) -> CompileResult<()> {
        match expr {
            Expr::Literal { value, .. } => {
                let index = self.literal_constant(value);
                self.emit(Instruction::new(Opcode::LoadConst, index));
                Ok(())
            }
            Expr::Identifier { name, .. } => {
                match self.resolve(name) {
                    Resolution::Local(slot) => {
                        self.emit(Instruction::new(Opcode::LoadVar, slot));
                    }
                    Resolution::Upvalue(index) => {
                        self.emit(Instruction::new(Opcode::LoadUpvalue, index));
                    }
                    Resolution::Global(slot) => {
                        self.emit(Instruction::new(Opcode::LoadGlobal, slot));
                    }
                }
                Ok(())
            }
            Expr::Binary {
                operator,
                left,
                right,
                ..
            } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.emit_op(binary_opcode(*operator));
                Ok(())
            }
            Expr::Unary {
                operator, operand, ..
            } => {
                self.compile_expr(operand)?;
                self.emit_op(match operator {
                    UnaryOp::Minus => Opcode::Neg,
                    UnaryOp::Not => Opcode::Not,
                });
                Ok(())
            }
            Expr::Call { callee, args, .. } => {
                for arg in args {
                    self.compile_expr(arg)?;
                }
                self.compile_expr(callee)?;
                self.emit(Instruction::new(Opcode::Call, args.len() as u32));
                Ok(())
            }
            Expr::Member { object, member, .. } => {
                self.compile_expr(object)?;
                let index = self.string_constant(member);
                self.emit(Instruction::new(Opcode::GetAttr, index));
                Ok(())
            }
            Expr::Index { object, index, .. } => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.emit_op(Opcode::GetIndex);
                Ok(())
            }
            Expr::Assign { target, value, .. } => self.compile_assignment(target, value),
            Expr::Lambda { params, body, .. } => {
                let name = format!("__lambda{}", self.lambda_counter);
                self.lambda_counter += 1;
                let proto = self.compile_function(&name, params, body, false)?;
                self.load_function_value(proto);
                Ok(())
            }
            Expr::List { elements, .. } => {
                for element in elements {
                    self.compile_expr(element)?;
                }
                self.emit(Instruction::new(Opcode::MakeList, elements.len() as u32));
                Ok(())
            }
            Expr::MapLiteral { entries, .. } => {
                for (key, value) in entries {
                    self.compile_expr(key)?;
                    self.compile_expr(value)?;
                }
                self.emit(Instruction::new(Opcode::MakeMap, entries.len() as u32));
                Ok(())
            }
            // `a |> b` compiles identically to `b(a)`.
            Expr::Pipe { value, callee, .. } => {
                self.compile_expr(value)?;
                self.compile_expr(callee)?;
                self.emit(Instruction::new(Opcode::Call, 1));
                Ok(())
            }
            Expr::New { class, args, .. } => {
                for arg in args {
                    self.compile_expr(arg)?;
                }
                self.compile_expr(class)?;
                self.emit(Instruction::new(Opcode::NewInstance, args.len() as u32));
                Ok(())
            }
            Expr::Await { position, .. } | Expr::Spawn { position, .. } => {
                Err(CompileError::new(
                    "async execution is not part of the bytecode core",
                    position,
                ))
            }
            Expr::Print { args, .. } => {
                for arg in args {
                    self.compile_expr(arg)?;
                }
                self.emit(Instruction::new(Opcode::Print, args.len() as u32));
                Ok(())
            }
        }
    }

    /// Assignment is expression-valued: the value is duplicated before the
    /// store so a copy survives as the result.
    fn compile_assignment(&mut self, target: &AssignTarget, value: &Expr) -> CompileResult<()> {
        match target {
            AssignTarget::Variable { name } => {
                self.compile_expr(value)?;
                self.emit_op(Opcode::Dup);
                match self.resolve(name) {
                    Resolution::Local(slot) => {
                        self.emit(Instruction::new(Opcode::StoreVar, slot));
                    }
                    Resolution::Upvalue(index) => {
                        self.emit(Instruction::new(Opcode::StoreUpvalue, index));
                    }
                    Resolution::Global(slot) => {
                        self.emit(Instruction::new(Opcode::StoreGlobal, slot));
                    }
                }
                Ok(())
            }
            AssignTarget::Member { object, member } => {
                self.compile_expr(value)?;
                self.emit_op(Opcode::Dup);
                self.compile_expr(object)?;
                let index = self.string_constant(member);
                self.emit(Instruction::new(Opcode::SetAttr, index));
                Ok(())
            }
            AssignTarget::Index { object, index } => {
                self.compile_expr(value)?;
                self.emit_op(Opcode::Dup);
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.emit_op(Opcode::SetIndex);
                Ok(())
            }
        }
    }
}

fn binary_opcode(operator: BinaryOp) -> Opcode {
    match operator {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Subtract => Opcode::Sub,
        BinaryOp::Multiply => Opcode::Mul,
        BinaryOp::Divide => Opcode::Div,
        BinaryOp::Modulo => Opcode::Mod,
        BinaryOp::Power => Opcode::Pow,
        BinaryOp::Equal => Opcode::Eq,
        BinaryOp::NotEqual => Opcode::Ne,
        BinaryOp::Less => Opcode::Lt,
        BinaryOp::Greater => Opcode::Gt,
        BinaryOp::LessEqual => Opcode::Le,
        BinaryOp::GreaterEqual => Opcode::Ge,
        BinaryOp::And => Opcode::And,
        BinaryOp::Or => Opcode::Or,
    }
}
