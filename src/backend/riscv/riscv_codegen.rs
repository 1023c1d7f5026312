//! RISC-V (RV64) assembly generation
//!
//! Walks a resolved and checked program and writes assembly for the
//! RARS/Venus environment-call convention. Values live in registers taken
//! from [`RegisterAllocator`]; every register is freed by the construct that
//! consumed it.
//!
//! Memory layout:
//! - globals are `.data` cells labelled with the variable name; reading one
//!   takes two steps (`la` the cell, then load through it)
//! - locals live in the stack frame of the scope that declared them; each
//!   block with locals moves `sp` on entry and exit, reading one is a single
//!   load relative to `sp`
//! - structs are heap blocks obtained with `sbrk`; a struct variable, a
//!   struct parameter and a struct result are all pointers to the block
//!
//! Function bodies are written to their own stream and appended after the
//! top-level code, so calls may refer to functions defined later.

use crate::backend::codegen::CodeGen;
use crate::backend::riscv::label::LabelGenerator;
use crate::backend::riscv::register::{Register, RegisterAllocator, RegisterClass};
use crate::frontend::ast::*;
use crate::frontend::symbol::{align16, Location, ScopeId, ScopeTree};
use crate::types::{Type, WORD_SIZE};
use crate::utils::{Error, Result};

/// Environment call: allocate heap memory (`sbrk`)
const SYSCALL_SBRK: i64 = 9;
/// Environment call: exit the program
const SYSCALL_EXIT: i64 = 10;

/// Scope cursor handed down the recursion
#[derive(Clone, Copy)]
struct Cx<'s> {
    scopes: &'s ScopeTree,
    scope: ScopeId,
}

impl<'s> Cx<'s> {
    fn enter(self, scope: ScopeId) -> Self {
        Self { scopes: self.scopes, scope }
    }
}

/// A function body under construction
struct Frame {
    lines: Vec<String>,
    /// Bytes pushed by the blocks currently open inside the function
    depth: usize,
    epilogue: String,
}

fn class_of(ty: &Type) -> RegisterClass {
    if ty.is_float() {
        RegisterClass::Float
    } else {
        RegisterClass::General
    }
}

fn load_op(float: bool) -> &'static str {
    if float { "fld" } else { "ld" }
}

fn store_op(float: bool) -> &'static str {
    if float { "fsd" } else { "sd" }
}

fn move_op(float: bool) -> &'static str {
    if float { "fmv.d" } else { "mv" }
}

fn abi_register(float: bool) -> &'static str {
    if float { "fa0" } else { "a0" }
}

/// RISC-V code generator
pub struct RiscvCodeGen {
    target_triple: String,
    /// Omit the `__start`/`__end` wrapper
    test_mode: bool,
    registers: RegisterAllocator,
    labels: LabelGenerator,
    data: Vec<String>,
    text: Vec<String>,
    functions: Vec<String>,
    frame: Option<Frame>,
}

impl RiscvCodeGen {
    pub fn new() -> Self {
        Self {
            target_triple: "riscv64-unknown-elf".to_string(),
            test_mode: false,
            registers: RegisterAllocator::new(),
            labels: LabelGenerator::new(),
            data: Vec::new(),
            text: Vec::new(),
            functions: Vec::new(),
            frame: None,
        }
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    #[cfg(test)]
    pub fn registers(&self) -> &RegisterAllocator {
        &self.registers
    }

    fn reset(&mut self) {
        self.registers = RegisterAllocator::new();
        self.labels = LabelGenerator::new();
        self.data.clear();
        self.text.clear();
        self.functions.clear();
        self.frame = None;
    }

    // ==================== Emission ====================

    fn stream(&mut self) -> &mut Vec<String> {
        match &mut self.frame {
            Some(frame) => &mut frame.lines,
            None => &mut self.text,
        }
    }

    fn emit(&mut self, instruction: String) {
        self.stream().push(format!("    {}", instruction));
    }

    fn emit_label(&mut self, label: &str) {
        self.stream().push(format!("{}:", label));
    }

    fn alloc(&mut self, class: RegisterClass) -> Result<Register> {
        self.registers.alloc(class)
    }

    fn free(&mut self, reg: Register) {
        self.registers.free(reg);
    }

    /// Move a value into a callee-saved register so it survives a call
    fn preserve(&mut self, reg: Register) -> Result<Register> {
        let saved = self.alloc(reg.class().saved())?;
        self.emit(format!("{} {}, {}", move_op(reg.is_float()), saved, reg));
        self.free(reg);
        Ok(saved)
    }

    /// Reserve the stack space of `scope`
    fn push_frame(&mut self, cx: Cx, scope: ScopeId) {
        let space = cx.scopes.stack_space(scope);
        if space == 0 {
            return;
        }
        self.emit(format!("addi sp, sp, -{}", space));
        if let Some(frame) = &mut self.frame {
            frame.depth += space;
        }
    }

    /// Release the stack space of `scope`, emitting the `addi` if asked
    fn pop_frame(&mut self, cx: Cx, scope: ScopeId, emit: bool) {
        let space = cx.scopes.stack_space(scope);
        if space == 0 {
            return;
        }
        if emit {
            self.emit(format!("addi sp, sp, {}", space));
        }
        if let Some(frame) = &mut self.frame {
            frame.depth -= space;
        }
    }

    fn locate(&self, cx: Cx, name: &str) -> Result<Location> {
        cx.scopes
            .locate(cx.scope, name)
            .ok_or_else(|| Error::CodeGen(format!("no storage for {:?}", name)))
    }

    fn declared_type(&self, cx: Cx, name: &str) -> Result<Type> {
        cx.scopes
            .resolve(cx.scope, name)
            .and_then(|(_, symbol)| symbol.resolved_type().cloned())
            .ok_or_else(|| Error::CodeGen(format!("type of {:?} was never resolved", name)))
    }

    // ==================== Statements ====================

    fn compile_stmt(&mut self, cx: Cx, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Print { value, .. } => {
                let code = value.ty.print_code().ok_or_else(|| {
                    Error::CodeGen(format!("can not print a value of type {}", value.ty))
                })?;
                let reg = self.compile_expr(cx, value)?;
                self.emit(format!("{} {}, {}", move_op(reg.is_float()), abi_register(reg.is_float()), reg));
                self.emit(format!("li a7, {}", code));
                self.emit("ecall".to_string());
                self.free(reg);
                Ok(())
            }
            Stmt::Var { name, value, .. } => self.compile_var(cx, &name.name, value.as_ref()),
            Stmt::Assign { target, value, .. } => self.compile_assign(cx, target, value),
            Stmt::Block(block) => self.compile_block(cx, block),
            Stmt::If { cond, then_block, else_block, .. } => {
                let cond_reg = self.compile_expr(cx, cond)?;
                let false_label = self.labels.create();
                let done_label = self.labels.create();
                self.emit(format!("beqz {}, {}", cond_reg, false_label));
                self.free(cond_reg);

                self.compile_block(cx, then_block)?;
                self.emit(format!("j {}", done_label));
                self.emit_label(&false_label);
                if let Some(else_block) = else_block {
                    self.compile_block(cx, else_block)?;
                }
                self.emit_label(&done_label);
                Ok(())
            }
            Stmt::For(for_loop) => self.compile_for(cx, for_loop),
            Stmt::Type { .. } => Ok(()),
            Stmt::Func(func) => self.compile_function(cx, func),
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    let reg = self.compile_expr(cx, value)?;
                    self.emit(format!("{} {}, {}", move_op(reg.is_float()), abi_register(reg.is_float()), reg));
                    self.free(reg);
                }
                let (depth, epilogue) = match &self.frame {
                    Some(frame) => (frame.depth, frame.epilogue.clone()),
                    None => return Err(Error::CodeGen("return outside of a function".to_string())),
                };
                if depth > 0 {
                    self.emit(format!("addi sp, sp, {}", depth));
                }
                self.emit(format!("j {}", epilogue));
                Ok(())
            }
            Stmt::Expr(expr) => {
                let reg = match &expr.kind {
                    ExprKind::Call { callee, arg } => self.compile_call(cx, callee, arg.as_deref(), &expr.ty)?,
                    _ => Some(self.compile_expr(cx, expr)?),
                };
                if let Some(reg) = reg {
                    self.free(reg);
                }
                Ok(())
            }
        }
    }

    fn compile_block(&mut self, cx: Cx, block: &Block) -> Result<()> {
        let scope = block.scope.ok_or_else(|| Error::CodeGen("block was not resolved".to_string()))?;
        self.push_frame(cx, scope);
        let inner = cx.enter(scope);
        for stmt in &block.stmts {
            self.compile_stmt(inner, stmt)?;
        }
        // a trailing return has already unwound this frame
        let returned = matches!(block.stmts.last(), Some(Stmt::Return { .. }));
        self.pop_frame(cx, scope, !returned);
        Ok(())
    }

    fn compile_for(&mut self, cx: Cx, for_loop: &ForLoop) -> Result<()> {
        let scope = for_loop
            .scope
            .ok_or_else(|| Error::CodeGen("for loop was not resolved".to_string()))?;
        self.push_frame(cx, scope);
        let inner = cx.enter(scope);

        self.compile_stmt(inner, &for_loop.init)?;
        let top = self.labels.create();
        let done = self.labels.create();
        self.emit_label(&top);
        let cond = self.compile_expr(inner, &for_loop.cond)?;
        self.emit(format!("beqz {}, {}", cond, done));
        self.free(cond);
        self.compile_block(inner, &for_loop.body)?;
        self.compile_stmt(inner, &for_loop.next)?;
        self.emit(format!("j {}", top));
        self.emit_label(&done);

        self.pop_frame(cx, scope, true);
        Ok(())
    }

    fn compile_var(&mut self, cx: Cx, name: &str, value: Option<&Expr>) -> Result<()> {
        let ty = self.declared_type(cx, name)?;
        let location = self.locate(cx, name)?;

        if let Location::Global(label) = &location {
            let directive = if ty.is_float() { ".double" } else { ".dword" };
            self.data.push(format!("{}: {} 0", label, directive));
        }

        match (value, &ty) {
            (Some(value), _) => self.store_variable(cx, name, value),
            (None, Type::Struct(_)) => {
                self.emit(format!("li a0, {}", ty.heap_size()));
                self.emit(format!("li a7, {}", SYSCALL_SBRK));
                self.emit("ecall".to_string());
                match location {
                    Location::Global(label) => {
                        let addr = self.alloc(RegisterClass::General)?;
                        self.emit(format!("la {}, {}", addr, label));
                        self.emit(format!("sd a0, 0({})", addr));
                        self.free(addr);
                    }
                    Location::Stack(offset) => self.emit(format!("sd a0, {}(sp)", offset)),
                    Location::Func(_) => {
                        return Err(Error::CodeGen(format!("{:?} is a function, not a variable", name)))
                    }
                }
                Ok(())
            }
            (None, _) => {
                // globals start zeroed in .data, locals are cleared here
                if let Location::Stack(offset) = location {
                    self.emit(format!("sd zero, {}(sp)", offset));
                }
                Ok(())
            }
        }
    }

    fn compile_assign(&mut self, cx: Cx, target: &Expr, value: &Expr) -> Result<()> {
        match &target.kind {
            ExprKind::Ident(id) => self.store_variable(cx, &id.name, value),
            ExprKind::Selector { base, offset, .. } => {
                let mut pointer = self.compile_expr(cx, base)?;
                if value.contains_call() {
                    pointer = self.preserve(pointer)?;
                }
                let reg = self.compile_expr(cx, value)?;
                self.emit(format!("{} {}, {}({})", store_op(reg.is_float()), reg, offset, pointer));
                self.free(reg);
                self.free(pointer);
                Ok(())
            }
            _ => Err(Error::CodeGen(format!("can not assign to {}", target.describe()))),
        }
    }

    fn store_variable(&mut self, cx: Cx, name: &str, value: &Expr) -> Result<()> {
        match self.locate(cx, name)? {
            Location::Global(label) => {
                let class = if value.contains_call() { RegisterClass::Saved } else { RegisterClass::General };
                let addr = self.alloc(class)?;
                self.emit(format!("la {}, {}", addr, label));
                let reg = self.compile_expr(cx, value)?;
                self.emit(format!("{} {}, 0({})", store_op(reg.is_float()), reg, addr));
                self.free(reg);
                self.free(addr);
            }
            Location::Stack(offset) => {
                let reg = self.compile_expr(cx, value)?;
                self.emit(format!("{} {}, {}(sp)", store_op(reg.is_float()), reg, offset));
                self.free(reg);
            }
            Location::Func(_) => {
                return Err(Error::CodeGen(format!("can not assign to function {:?}", name)));
            }
        }
        Ok(())
    }

    fn compile_function(&mut self, cx: Cx, func: &Function) -> Result<()> {
        let Some(body) = &func.body else {
            return Ok(());
        };
        let name = &func.name.name;
        let scope = func
            .scope
            .ok_or_else(|| Error::CodeGen(format!("function {} was not resolved", name)))?;
        if self.frame.is_some() {
            return Err(Error::CodeGen(format!("function {} is nested in another function", name)));
        }

        let epilogue = self.labels.create();
        // saved registers touched by top-level code need no restoring
        self.registers.take_touched();
        self.frame = Some(Frame { lines: Vec::new(), depth: 0, epilogue: epilogue.clone() });
        let compiled = self.compile_block(cx.enter(scope), body);
        let frame = self.frame.take();
        compiled?;
        let frame = frame.ok_or_else(|| Error::CodeGen(format!("lost the frame of function {}", name)))?;
        let saved = self.registers.take_touched();

        let params = cx.scopes.num_definitions(scope);
        let size = align16((params + saved.len() + 1) * WORD_SIZE).max(16);
        let ra = size - WORD_SIZE;
        log::debug!(
            "function {}: frame {} bytes, {} saved registers",
            name,
            size,
            saved.len()
        );

        let out = &mut self.functions;
        out.push(format!("{}:", name));
        out.push(format!("    addi sp, sp, -{}", size));
        out.push(format!("    sd ra, {}(sp)", ra));
        for (i, reg) in saved.iter().enumerate() {
            out.push(format!("    {} {}, {}(sp)", store_op(reg.is_float()), reg, (params + i) * WORD_SIZE));
        }
        if let Some(Param { name: Some(_), ty }) = &func.param {
            let float = matches!(ty, TypeExpr::Float);
            out.push(format!("    {} {}, 0(sp)", store_op(float), abi_register(float)));
        }
        out.extend(frame.lines);
        out.push(format!("{}:", epilogue));
        for (i, reg) in saved.iter().enumerate() {
            out.push(format!("    {} {}, {}(sp)", load_op(reg.is_float()), reg, (params + i) * WORD_SIZE));
        }
        out.push(format!("    ld ra, {}(sp)", ra));
        out.push(format!("    addi sp, sp, {}", size));
        out.push("    ret".to_string());
        Ok(())
    }

    // ==================== Expressions ====================

    fn compile_expr(&mut self, cx: Cx, expr: &Expr) -> Result<Register> {
        match &expr.kind {
            ExprKind::Int(value) => {
                let reg = self.alloc(RegisterClass::General)?;
                self.emit(format!("li {}, {}", reg, value));
                Ok(reg)
            }
            ExprKind::Bool(value) => {
                let reg = self.alloc(RegisterClass::General)?;
                self.emit(format!("li {}, {}", reg, i64::from(*value)));
                Ok(reg)
            }
            ExprKind::Float(value) => {
                let label = self.labels.create();
                self.data.push(format!("{}: .double {}", label, value));
                let reg = self.alloc(RegisterClass::Float)?;
                let tmp = self.alloc(RegisterClass::General)?;
                self.emit(format!("fld {}, {}, {}", reg, label, tmp));
                self.free(tmp);
                Ok(reg)
            }
            ExprKind::Str(value) => {
                let label = self.labels.create();
                self.data.push(format!("{}: .string \"{}\"", label, value));
                let reg = self.alloc(RegisterClass::General)?;
                self.emit(format!("la {}, {}", reg, label));
                Ok(reg)
            }
            ExprKind::Ident(id) => self.compile_ident(cx, &id.name, &expr.ty),
            ExprKind::Binary { left, op, right } => self.compile_binary(cx, left, *op, right),
            ExprKind::Call { callee, arg } => self
                .compile_call(cx, callee, arg.as_deref(), &expr.ty)?
                .ok_or_else(|| Error::CodeGen(format!("{} produces no value", expr.describe()))),
            ExprKind::Selector { base, offset, .. } => {
                let pointer = self.compile_expr(cx, base)?;
                if expr.ty.is_float() {
                    let reg = self.alloc(RegisterClass::Float)?;
                    self.emit(format!("fld {}, {}({})", reg, offset, pointer));
                    self.free(pointer);
                    Ok(reg)
                } else {
                    self.emit(format!("ld {}, {}({})", pointer, offset, pointer));
                    Ok(pointer)
                }
            }
        }
    }

    fn compile_ident(&mut self, cx: Cx, name: &str, ty: &Type) -> Result<Register> {
        match self.locate(cx, name)? {
            Location::Global(label) => {
                if ty.is_float() {
                    let addr = self.alloc(RegisterClass::General)?;
                    self.emit(format!("la {}, {}", addr, label));
                    let reg = self.alloc(RegisterClass::Float)?;
                    self.emit(format!("fld {}, 0({})", reg, addr));
                    self.free(addr);
                    Ok(reg)
                } else {
                    let reg = self.alloc(RegisterClass::General)?;
                    self.emit(format!("la {}, {}", reg, label));
                    self.emit(format!("ld {}, 0({})", reg, reg));
                    Ok(reg)
                }
            }
            Location::Stack(offset) => {
                let reg = self.alloc(class_of(ty))?;
                self.emit(format!("{} {}, {}(sp)", load_op(ty.is_float()), reg, offset));
                Ok(reg)
            }
            Location::Func(label) => {
                let reg = self.alloc(RegisterClass::General)?;
                self.emit(format!("la {}, {}", reg, label));
                Ok(reg)
            }
        }
    }

    fn compile_binary(&mut self, cx: Cx, left: &Expr, op: BinOp, right: &Expr) -> Result<Register> {
        let mut lhs = self.compile_expr(cx, left)?;
        if right.contains_call() {
            lhs = self.preserve(lhs)?;
        }
        let rhs = self.compile_expr(cx, right)?;

        if left.ty.is_float() {
            let mnemonic = match op {
                BinOp::Add => "fadd.d",
                BinOp::Sub => "fsub.d",
                BinOp::Mul => "fmul.d",
                BinOp::Div => "fdiv.d",
                BinOp::Lt | BinOp::Eq | BinOp::Ne => {
                    // comparisons produce an integer 0/1
                    let result = self.alloc(RegisterClass::General)?;
                    let compare = if op == BinOp::Lt { "flt.d" } else { "feq.d" };
                    self.emit(format!("{} {}, {}, {}", compare, result, lhs, rhs));
                    if op == BinOp::Ne {
                        self.emit(format!("xori {}, {}, 1", result, result));
                    }
                    self.free(lhs);
                    self.free(rhs);
                    return Ok(result);
                }
            };
            self.emit(format!("{} {}, {}, {}", mnemonic, lhs, lhs, rhs));
        } else {
            match op {
                BinOp::Add => self.emit(format!("add {}, {}, {}", lhs, lhs, rhs)),
                BinOp::Sub => self.emit(format!("sub {}, {}, {}", lhs, lhs, rhs)),
                BinOp::Mul => self.emit(format!("mul {}, {}, {}", lhs, lhs, rhs)),
                BinOp::Div => self.emit(format!("div {}, {}, {}", lhs, lhs, rhs)),
                BinOp::Lt => self.emit(format!("slt {}, {}, {}", lhs, lhs, rhs)),
                BinOp::Eq => {
                    self.emit(format!("sub {}, {}, {}", lhs, lhs, rhs));
                    self.emit(format!("seqz {}, {}", lhs, lhs));
                }
                BinOp::Ne => {
                    self.emit(format!("sub {}, {}, {}", lhs, lhs, rhs));
                    self.emit(format!("snez {}, {}", lhs, lhs));
                }
            }
        }

        self.free(rhs);
        Ok(lhs)
    }

    /// Returns the register holding the result, `None` for a nil result
    fn compile_call(
        &mut self,
        cx: Cx,
        callee: &Expr,
        arg: Option<&Expr>,
        result: &Type,
    ) -> Result<Option<Register>> {
        let direct = match &callee.kind {
            ExprKind::Ident(id) => match self.locate(cx, &id.name)? {
                Location::Func(label) => Some(label),
                _ => None,
            },
            _ => None,
        };

        let target = match direct {
            Some(_) => None,
            None => {
                let mut target = self.compile_expr(cx, callee)?;
                if arg.map_or(false, Expr::contains_call) {
                    target = self.preserve(target)?;
                }
                Some(target)
            }
        };

        if let Some(arg) = arg {
            let reg = self.compile_expr(cx, arg)?;
            self.emit(format!("{} {}, {}", move_op(reg.is_float()), abi_register(reg.is_float()), reg));
            self.free(reg);
        }

        match (direct, target) {
            (Some(label), _) => self.emit(format!("call {}", label)),
            (None, Some(target)) => {
                self.emit(format!("jalr {}", target));
                self.free(target);
            }
            (None, None) => return Err(Error::CodeGen(format!("nothing to call in {}", callee.describe()))),
        }

        if result.is_nil() {
            return Ok(None);
        }
        let reg = self.alloc(class_of(result))?;
        self.emit(format!("{} {}, {}", move_op(reg.is_float()), reg, abi_register(reg.is_float())));
        Ok(Some(reg))
    }

    fn assemble(&self) -> String {
        let mut lines = vec![".data".to_string()];
        lines.extend(self.data.iter().cloned());
        lines.push(".text".to_string());
        if self.test_mode {
            lines.extend(self.text.iter().cloned());
            lines.extend(self.functions.iter().cloned());
        } else {
            lines.push(".globl __start".to_string());
            lines.push("__start:".to_string());
            lines.extend(self.text.iter().cloned());
            lines.push("    j __end".to_string());
            lines.extend(self.functions.iter().cloned());
            lines.push("__end:".to_string());
            lines.push(format!("    li a7, {}", SYSCALL_EXIT));
            lines.push("    ecall".to_string());
        }
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

impl Default for RiscvCodeGen {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGen for RiscvCodeGen {
    fn generate(&mut self, program: &Program, scopes: &ScopeTree) -> Result<String> {
        self.reset();
        let scope = program
            .scope
            .ok_or_else(|| Error::CodeGen("program was not resolved".to_string()))?;
        let cx = Cx { scopes, scope };

        for stmt in &program.stmts {
            self.compile_stmt(cx, stmt)?;
        }
        debug_assert!(self.registers.all_free(), "register leaked during code generation");

        log::debug!(
            "generated {} data entries, {} top-level lines, {} function lines",
            self.data.len(),
            self.text.len(),
            self.functions.len()
        );
        Ok(self.assemble())
    }

    fn target_triple(&self) -> &str {
        &self.target_triple
    }

    fn name(&self) -> &str {
        "RISC-V"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::checker::check;
    use crate::frontend::parser::parse;
    use crate::frontend::resolver::Resolver;
    use pretty_assertions::assert_eq;

    fn generate(source: &str, test_mode: bool) -> Result<String> {
        let mut program = parse(source).expect("syntax error in test source");
        let mut resolver = Resolver::new();
        resolver.resolve(&mut program)?;
        check(resolver.scopes_mut(), &mut program)?;
        let mut codegen = RiscvCodeGen::new().with_test_mode(test_mode);
        let asm = codegen.generate(&program, resolver.scopes())?;
        assert!(codegen.registers().all_free());
        Ok(asm)
    }

    /// Compile in test mode and return trimmed, non-empty lines
    fn compile(source: &str) -> Vec<String> {
        match generate(source, true) {
            Ok(asm) => asm.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect(),
            Err(err) => panic!("compilation failed: {}", err),
        }
    }

    fn expected(asm: &str) -> Vec<String> {
        asm.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect()
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(
            compile("2 + 2 - 2"),
            expected(
                "
                .data
                .text
                li t0, 2
                li t1, 2
                add t0, t0, t1
                li t1, 2
                sub t0, t0, t1"
            )
        );
    }

    #[test]
    fn test_float_arithmetic() {
        assert_eq!(
            compile("2.1 * 2.1"),
            expected(
                "
                .data
                .L1: .double 2.1
                .L2: .double 2.1
                .text
                fld ft0, .L1, t0
                fld ft1, .L2, t0
                fmul.d ft0, ft0, ft1"
            )
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            compile("print 1 == 2"),
            expected(
                "
                .data
                .text
                li t0, 1
                li t1, 2
                sub t0, t0, t1
                seqz t0, t0
                mv a0, t0
                li a7, 1
                ecall"
            )
        );
        assert_eq!(
            compile("print 1.5 != 2.5"),
            expected(
                "
                .data
                .L1: .double 1.5
                .L2: .double 2.5
                .text
                fld ft0, .L1, t0
                fld ft1, .L2, t0
                feq.d t0, ft0, ft1
                xori t0, t0, 1
                mv a0, t0
                li a7, 1
                ecall"
            )
        );
    }

    #[test]
    fn test_print() {
        assert_eq!(
            compile("print \"hi\"\nprint 4.5"),
            expected(
                "
                .data
                .L1: .string \"hi\"
                .L2: .double 4.5
                .text
                la t0, .L1
                mv a0, t0
                li a7, 4
                ecall
                fld ft0, .L2, t0
                fmv.d fa0, ft0
                li a7, 3
                ecall"
            )
        );
    }

    #[test]
    fn test_global_load_store_shape() {
        assert_eq!(
            compile("var x int = 2\nx = x + 1\nprint x"),
            expected(
                "
                .data
                x: .dword 0
                .text
                la t0, x
                li t1, 2
                sd t1, 0(t0)
                la t0, x
                la t1, x
                ld t1, 0(t1)
                li t2, 1
                add t1, t1, t2
                sd t1, 0(t0)
                la t0, x
                ld t0, 0(t0)
                mv a0, t0
                li a7, 1
                ecall"
            )
        );
    }

    #[test]
    fn test_float_global() {
        assert_eq!(
            compile("var x float\nx = 2.0\nprint x"),
            expected(
                "
                .data
                x: .double 0
                .L1: .double 2
                .text
                la t0, x
                fld ft0, .L1, t1
                fsd ft0, 0(t0)
                la t0, x
                fld ft0, 0(t0)
                fmv.d fa0, ft0
                li a7, 3
                ecall"
            )
        );
    }

    #[test]
    fn test_block_locals() {
        assert_eq!(
            compile("{\nvar a int = 1\n{\nvar b int = a\nprint b\n}\n}"),
            expected(
                "
                .data
                .text
                addi sp, sp, -16
                li t0, 1
                sd t0, 0(sp)
                addi sp, sp, -16
                ld t0, 16(sp)
                sd t0, 0(sp)
                ld t0, 0(sp)
                mv a0, t0
                li a7, 1
                ecall
                addi sp, sp, 16
                addi sp, sp, 16"
            )
        );
    }

    #[test]
    fn test_if_emits_two_labels() {
        let lines = compile("if 2 < 3 {\nprint 2\n}");
        assert_eq!(
            lines,
            expected(
                "
                .data
                .text
                li t0, 2
                li t1, 3
                slt t0, t0, t1
                beqz t0, .L1
                li t0, 2
                mv a0, t0
                li a7, 1
                ecall
                j .L2
                .L1:
                .L2:"
            )
        );
    }

    #[test]
    fn test_if_else() {
        let lines = compile("if true {\nprint 1\n} else {\nprint 2\n}");
        let labels: Vec<_> = lines.iter().filter(|l| l.ends_with(':')).collect();
        assert_eq!(labels, vec![".L1:", ".L2:"]);
        let false_at = lines.iter().position(|l| l == ".L1:").unwrap();
        assert_eq!(lines[false_at + 1], "li t0, 2");
    }

    #[test]
    fn test_for_loop() {
        assert_eq!(
            compile("for var i int = 0; i < 3; i = i + 1 {\nprint i\n}"),
            expected(
                "
                .data
                .text
                addi sp, sp, -16
                li t0, 0
                sd t0, 0(sp)
                .L1:
                ld t0, 0(sp)
                li t1, 3
                slt t0, t0, t1
                beqz t0, .L2
                ld t0, 0(sp)
                mv a0, t0
                li a7, 1
                ecall
                ld t0, 0(sp)
                li t1, 1
                add t0, t0, t1
                sd t0, 0(sp)
                j .L1
                .L2:
                addi sp, sp, 16"
            )
        );
    }

    #[test]
    fn test_greeter_call() {
        assert_eq!(
            compile("func greeter(x string) {\nprint x\n}\ngreeter(\"hi\")"),
            expected(
                "
                .data
                .L2: .string \"hi\"
                .text
                la t0, .L2
                mv a0, t0
                call greeter
                greeter:
                addi sp, sp, -16
                sd ra, 8(sp)
                sd a0, 0(sp)
                ld t0, 0(sp)
                mv a0, t0
                li a7, 4
                ecall
                .L1:
                ld ra, 8(sp)
                addi sp, sp, 16
                ret"
            )
        );
    }

    #[test]
    fn test_early_return_unwinds_blocks() {
        let lines = compile("func f(x int) int {\nif x < 1 {\nvar y int = x\nreturn y\n}\nreturn x\n}\nprint f(3)");
        // inside the if block the parameter sits above the block's frame
        let start = lines.iter().position(|l| l == "ld t0, 16(sp)").unwrap();
        assert_eq!(
            lines[start..start + 5].to_vec(),
            expected(
                "
                ld t0, 16(sp)
                sd t0, 0(sp)
                ld t0, 0(sp)
                mv a0, t0
                addi sp, sp, 16"
            )
        );
        assert_eq!(lines[start + 5], "j .L1");
        // the block's own pop would follow the jump, so it is left out
        assert_eq!(lines[start + 6], "j .L3");
        assert!(lines.ends_with(&expected("mv a0, t0\nj .L1\n.L1:\nld ra, 8(sp)\naddi sp, sp, 16\nret")));
    }

    #[test]
    fn test_float_parameter_and_result() {
        let lines = compile("func square(x float) float {\nreturn x * x\n}\nprint square(1.5)");
        assert_eq!(
            lines,
            expected(
                "
                .data
                .L2: .double 1.5
                .text
                fld ft0, .L2, t0
                fmv.d fa0, ft0
                call square
                fmv.d ft0, fa0
                fmv.d fa0, ft0
                li a7, 3
                ecall
                square:
                addi sp, sp, -16
                sd ra, 8(sp)
                fsd fa0, 0(sp)
                fld ft0, 0(sp)
                fld ft1, 0(sp)
                fmul.d ft0, ft0, ft1
                fmv.d fa0, ft0
                j .L1
                .L1:
                ld ra, 8(sp)
                addi sp, sp, 16
                ret"
            )
        );
    }

    #[test]
    fn test_unread_float_parameter_is_spilled_as_float() {
        let lines = compile("func f(x float) {\nprint 1\n}");
        assert_eq!(lines[3..6].to_vec(), expected("addi sp, sp, -16\nsd ra, 8(sp)\nfsd fa0, 0(sp)"));
    }

    #[test]
    fn test_struct_local_in_function_frame() {
        let lines = compile("type p struct{a int; b float}\nfunc f(x float) {\nvar v p\nv.b = x\nprint v.b\n}");
        let f_at = lines.iter().position(|l| l == "f:").unwrap();
        assert_eq!(
            lines[f_at..].to_vec(),
            expected(
                "
                f:
                addi sp, sp, -16
                sd ra, 8(sp)
                fsd fa0, 0(sp)
                addi sp, sp, -16
                li a0, 16
                li a7, 9
                ecall
                sd a0, 0(sp)
                ld t0, 0(sp)
                fld ft0, 16(sp)
                fsd ft0, 8(t0)
                ld t0, 0(sp)
                fld ft0, 8(t0)
                fmv.d fa0, ft0
                li a7, 3
                ecall
                addi sp, sp, 16
                .L1:
                ld ra, 8(sp)
                addi sp, sp, 16
                ret"
            )
        );
    }

    #[test]
    fn test_call_result_survives_nested_call() {
        let lines = compile("func f(x int) int {\nreturn x\n}\nprint 1 + f(2)");
        assert_eq!(
            lines[..9].to_vec(),
            expected(
                "
                .data
                .text
                li t0, 1
                mv s1, t0
                li t0, 2
                mv a0, t0
                call f
                mv t0, a0
                add s1, s1, t0"
            )
        );
    }

    #[test]
    fn test_callee_saves_touched_registers() {
        let lines = compile("func g() int {\nreturn 1\n}\nfunc f() int {\nreturn 2 * g()\n}\nprint f()");
        let f_at = lines.iter().position(|l| l == "f:").unwrap();
        assert_eq!(
            lines[f_at..f_at + 4].to_vec(),
            expected("f:\naddi sp, sp, -16\nsd ra, 8(sp)\nsd s1, 0(sp)")
        );
        assert!(lines.ends_with(&expected("ld s1, 0(sp)\nld ra, 8(sp)\naddi sp, sp, 16\nret")));
    }

    #[test]
    fn test_structs() {
        assert_eq!(
            compile("type human struct{name string; age int}\nvar h human\nh.age = 3\nprint h.age"),
            expected(
                "
                .data
                h: .dword 0
                .text
                li a0, 16
                li a7, 9
                ecall
                la t0, h
                sd a0, 0(t0)
                la t0, h
                ld t0, 0(t0)
                li t1, 3
                sd t1, 8(t0)
                la t0, h
                ld t0, 0(t0)
                ld t0, 8(t0)
                mv a0, t0
                li a7, 1
                ecall"
            )
        );
    }

    #[test]
    fn test_struct_parameter_is_a_pointer() {
        let lines = compile(
            "type p struct{x float}\nfunc getx(v p) float {\nreturn v.x\n}\nvar a p\nprint getx(a)",
        );
        assert!(lines.contains(&"call getx".to_string()));
        assert!(lines.contains(&"fmv.d ft0, fa0".to_string()));
        let f_at = lines.iter().position(|l| l == "getx:").unwrap();
        assert_eq!(
            lines[f_at + 3..f_at + 7].to_vec(),
            expected("sd a0, 0(sp)\nld t0, 0(sp)\nfld ft0, 0(t0)\nfmv.d fa0, ft0")
        );
    }

    #[test]
    fn test_indirect_call() {
        let lines = compile(
            "func twice(x int) int {\nreturn x * 2\n}\nvar g func(int) int = twice\nprint g(4)",
        );
        assert_eq!(
            lines[..14].to_vec(),
            expected(
                "
                .data
                g: .dword 0
                .text
                la t0, g
                la t1, twice
                sd t1, 0(t0)
                la t0, g
                ld t0, 0(t0)
                li t1, 4
                mv a0, t1
                jalr t0
                mv t0, a0
                mv a0, t0
                li a7, 1"
            )
        );
    }

    #[test]
    fn test_full_program_wrapper() {
        let asm = generate("print 1", false).unwrap();
        assert_eq!(
            asm,
            ".data\n.text\n.globl __start\n__start:\n    li t0, 1\n    mv a0, t0\n    li a7, 1\n    ecall\n    j __end\n__end:\n    li a7, 10\n    ecall\n"
        );
    }

    #[test]
    fn test_register_exhaustion() {
        let source = "print 1 + (2 + (3 + (4 + (5 + (6 + (7 + 8))))))";
        assert_eq!(generate(source, true), Err(Error::RegisterExhausted { class: "general" }));
    }

    #[test]
    fn test_type_error_produces_no_output() {
        assert!(matches!(generate("print 2.0 + 2", true), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_generator_is_reusable() {
        let mut program = parse("print 1.5").unwrap();
        let mut resolver = Resolver::new();
        resolver.resolve(&mut program).unwrap();
        check(resolver.scopes_mut(), &mut program).unwrap();
        let mut codegen = RiscvCodeGen::new().with_test_mode(true);
        let first = codegen.generate(&program, resolver.scopes()).unwrap();
        let second = codegen.generate(&program, resolver.scopes()).unwrap();
        assert_eq!(first, second);
    }
}
