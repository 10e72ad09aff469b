//! Tree-walking evaluator
//!
//! All state is allocated when the machine is created; evaluating `@sample`
//! never allocates. `printf` output goes into a preallocated, bounded buffer
//! and excess text is dropped.

use super::ast::{AssignOp, BinaryOp, Builtin, Expr, Target, UnaryOp};
use super::parser::{SLOT_SPL0, SLOT_SPL1, SLOT_SRATE};
use super::Program;
use std::fmt::{self, Write as _};

/// Size of the indexable memory, in values
pub const MEMORY_SIZE: usize = 262_144;

/// Upper bound on `loop`/`while` iterations across one `@init` run or one
/// `@sample` frame, nested loops included
pub const MAX_LOOP_ITERATIONS: usize = 1_048_576;

/// Capacity of the `printf` buffer, in bytes
pub const OUTPUT_CAPACITY: usize = 4096;

/// String literal `n` evaluates to `STRING_HANDLE_BASE + n`
pub const STRING_HANDLE_BASE: f64 = 10_000.0;

const CLOSE_FACTOR: f64 = 0.00001;

/// Runtime state of one compiled script
pub struct ScriptVm {
    program: Program,
    state: State,
}

struct State {
    vars: Vec<f64>,
    memory: Vec<f64>,
    output: String,
    /// Loop iterations left in the current run
    budget: usize,
}

impl ScriptVm {
    /// Create a machine; `@init` is not run until [`run_init`](Self::run_init)
    pub fn new(program: Program, sample_rate: f64) -> Self {
        let mut vars = vec![0.0; program.variables.len()];
        vars[SLOT_SRATE] = sample_rate;
        Self {
            program,
            state: State {
                vars,
                memory: vec![0.0; MEMORY_SIZE],
                output: String::with_capacity(OUTPUT_CAPACITY),
                budget: MAX_LOOP_ITERATIONS,
            },
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn run_init(&mut self) {
        if let Some(code) = &self.program.init {
            self.state.budget = MAX_LOOP_ITERATIONS;
            eval(code, &mut self.state, &self.program.strings);
        }
    }

    /// Run `@sample` on one stereo frame
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let Some(code) = &self.program.sample else {
            return (left, right);
        };

        self.state.vars[SLOT_SPL0] = f64::from(left);
        self.state.vars[SLOT_SPL1] = f64::from(right);
        self.state.budget = MAX_LOOP_ITERATIONS;
        eval(code, &mut self.state, &self.program.strings);
        (
            self.state.vars[SLOT_SPL0] as f32,
            self.state.vars[SLOT_SPL1] as f32,
        )
    }

    /// Update `srate` and run `@init` again
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.state.vars[SLOT_SRATE] = sample_rate;
        self.run_init();
    }

    pub fn sample_rate(&self) -> f64 {
        self.state.vars[SLOT_SRATE]
    }

    /// Current value of a variable by (case-insensitive) name
    pub fn variable(&self, name: &str) -> Option<f64> {
        let slot = self.slot(name)?;
        Some(self.state.vars[slot])
    }

    /// All named variables with their values, in declaration order
    pub fn variables(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.program
            .variables
            .iter()
            .zip(&self.state.vars)
            .map(|(name, value)| (name.as_str(), *value))
    }

    /// Text of the string literal a value refers to, if it is a handle
    pub fn string_for(&self, value: f64) -> Option<&str> {
        string_handle(value, &self.program.strings)
    }

    /// Overwrite a variable; fails for unknown names
    pub fn set_variable(&mut self, name: &str, value: f64) -> bool {
        match self.slot(name) {
            Some(slot) => {
                self.state.vars[slot] = value;
                true
            }
            None => false,
        }
    }

    /// Pending `printf` output, if any
    pub fn take_output(&mut self) -> Option<String> {
        if self.state.output.is_empty() {
            return None;
        }
        let text = self.state.output.clone();
        self.state.output.clear();
        Some(text)
    }

    /// Read one memory cell; out-of-range addresses read as zero
    pub fn memory(&self, address: usize) -> f64 {
        self.state.memory.get(address).copied().unwrap_or(0.0)
    }

    fn slot(&self, name: &str) -> Option<usize> {
        let name = name.to_ascii_lowercase();
        self.program.variables.iter().position(|v| *v == name)
    }
}

fn string_handle(value: f64, strings: &[String]) -> Option<&str> {
    let offset = value - STRING_HANDLE_BASE;
    if offset < 0.0 || offset.fract() != 0.0 {
        return None;
    }
    strings.get(offset as usize).map(String::as_str)
}

#[inline]
fn truthy(value: f64) -> bool {
    value.abs() >= CLOSE_FACTOR
}

#[inline]
fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn int_mod(a: f64, b: f64) -> f64 {
    let divisor = b as i64;
    if divisor == 0 {
        0.0
    } else {
        (a as i64).wrapping_rem(divisor) as f64
    }
}

fn address(base: f64, index: f64) -> Option<usize> {
    let addr = (base + index).floor();
    if addr >= 0.0 && addr < MEMORY_SIZE as f64 {
        Some(addr as usize)
    } else {
        None
    }
}

fn binary(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => int_mod(a, b),
        BinaryOp::Pow => a.powf(b),
        BinaryOp::Eq => flag((a - b).abs() < CLOSE_FACTOR),
        BinaryOp::NotEq => flag((a - b).abs() >= CLOSE_FACTOR),
        BinaryOp::Less => flag(a < b),
        BinaryOp::Greater => flag(a > b),
        BinaryOp::LessEq => flag(a <= b),
        BinaryOp::GreaterEq => flag(a >= b),
        BinaryOp::BitAnd => ((a as i64) & (b as i64)) as f64,
        BinaryOp::BitOr => ((a as i64) | (b as i64)) as f64,
    }
}

fn apply_assign(op: AssignOp, current: f64, value: f64) -> f64 {
    match op {
        AssignOp::Set => value,
        AssignOp::Add => current + value,
        AssignOp::Sub => current - value,
        AssignOp::Mul => current * value,
        AssignOp::Div => current / value,
        AssignOp::Mod => int_mod(current, value),
    }
}

fn eval(expr: &Expr, state: &mut State, strings: &[String]) -> f64 {
    match expr {
        Expr::Number(v) => *v,
        Expr::Str(index) => STRING_HANDLE_BASE + *index as f64,
        Expr::Var(slot) => state.vars[*slot],
        Expr::Index(base, index) => {
            let base = eval(base, state, strings);
            let index = eval(index, state, strings);
            address(base, index).map_or(0.0, |a| state.memory[a])
        }
        Expr::Assign(target, op, value) => {
            let value = eval(value, state, strings);
            match target {
                Target::Var(slot) => {
                    let result = apply_assign(*op, state.vars[*slot], value);
                    state.vars[*slot] = result;
                    result
                }
                Target::Mem(base, index) => {
                    let base = eval(base, state, strings);
                    let index = eval(index, state, strings);
                    match address(base, index) {
                        Some(a) => {
                            let result = apply_assign(*op, state.memory[a], value);
                            state.memory[a] = result;
                            result
                        }
                        None => value,
                    }
                }
            }
        }
        Expr::Unary(UnaryOp::Neg, operand) => -eval(operand, state, strings),
        Expr::Unary(UnaryOp::Not, operand) => flag(!truthy(eval(operand, state, strings))),
        Expr::Binary(op, lhs, rhs) => {
            let a = eval(lhs, state, strings);
            let b = eval(rhs, state, strings);
            binary(*op, a, b)
        }
        Expr::And(lhs, rhs) => {
            flag(truthy(eval(lhs, state, strings)) && truthy(eval(rhs, state, strings)))
        }
        Expr::Or(lhs, rhs) => {
            flag(truthy(eval(lhs, state, strings)) || truthy(eval(rhs, state, strings)))
        }
        Expr::Ternary(cond, then, other) => {
            if truthy(eval(cond, state, strings)) {
                eval(then, state, strings)
            } else {
                eval(other, state, strings)
            }
        }
        Expr::Seq(items) => {
            let mut last = 0.0;
            for item in items {
                last = eval(item, state, strings);
            }
            last
        }
        Expr::Call(builtin, args) => call(*builtin, args, state, strings),
    }
}

fn call(builtin: Builtin, args: &[Expr], state: &mut State, strings: &[String]) -> f64 {
    let arg = |i: usize, state: &mut State| args.get(i).map_or(0.0, |e| eval(e, state, strings));

    match builtin {
        Builtin::Loop => {
            let count = arg(0, state);
            let count = if count.is_nan() || count < 1.0 {
                0
            } else {
                count as usize
            };
            let mut last = 0.0;
            for _ in 0..count {
                if state.budget == 0 {
                    break;
                }
                state.budget -= 1;
                last = arg(1, state);
            }
            last
        }
        Builtin::While => {
            let mut iterations = 0;
            while state.budget > 0 && truthy(arg(0, state)) {
                state.budget -= 1;
                iterations += 1;
            }
            flag(iterations > 0)
        }
        Builtin::Printf => printf(args, state, strings),
        Builtin::Atan2 => {
            let y = arg(0, state);
            y.atan2(arg(1, state))
        }
        Builtin::Min => {
            let a = arg(0, state);
            a.min(arg(1, state))
        }
        Builtin::Max => {
            let a = arg(0, state);
            a.max(arg(1, state))
        }
        Builtin::Pow => {
            let a = arg(0, state);
            a.powf(arg(1, state))
        }
        unary => {
            let x = arg(0, state);
            match unary {
                Builtin::Sin => x.sin(),
                Builtin::Cos => x.cos(),
                Builtin::Tan => x.tan(),
                Builtin::Asin => x.asin(),
                Builtin::Acos => x.acos(),
                Builtin::Atan => x.atan(),
                Builtin::Sqrt => x.sqrt(),
                Builtin::Exp => x.exp(),
                Builtin::Log => x.ln(),
                Builtin::Log10 => x.log10(),
                Builtin::Abs => x.abs(),
                Builtin::Floor => x.floor(),
                Builtin::Ceil => x.ceil(),
                Builtin::Sign => {
                    if x > 0.0 {
                        1.0
                    } else if x < 0.0 {
                        -1.0
                    } else {
                        0.0
                    }
                }
                Builtin::InvSqrt => 1.0 / x.sqrt(),
                _ => 0.0,
            }
        }
    }
}

/// Appends to a string without growing it past a fixed limit
struct Bounded<'a> {
    buf: &'a mut String,
    written: usize,
}

impl fmt::Write for Bounded<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = OUTPUT_CAPACITY.saturating_sub(self.buf.len());
        let mut take = s.len().min(room);
        while !s.is_char_boundary(take) {
            take -= 1;
        }
        self.buf.push_str(&s[..take]);
        self.written += s[..take].chars().count();
        Ok(())
    }
}

fn emit(buf: &mut String, args: fmt::Arguments<'_>) -> usize {
    let mut out = Bounded { buf, written: 0 };
    let _ = out.write_fmt(args);
    out.written
}

/// `printf(format, ...)`; returns the number of characters written
fn printf(args: &[Expr], state: &mut State, strings: &[String]) -> f64 {
    let Some(format_expr) = args.first() else {
        return 0.0;
    };
    let handle = eval(format_expr, state, strings);
    let Some(format) = string_handle(handle, strings) else {
        return 0.0;
    };

    let mut values = args[1..].iter();
    let mut written = 0;
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            written += emit(&mut state.output, format_args!("{c}"));
            continue;
        }

        let mut width = 0usize;
        let mut precision: Option<usize> = None;
        while let Some(d) = chars.peek().and_then(|d| d.to_digit(10)) {
            width = width * 10 + d as usize;
            chars.next();
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut p = 0usize;
            while let Some(d) = chars.peek().and_then(|d| d.to_digit(10)) {
                p = p * 10 + d as usize;
                chars.next();
            }
            precision = Some(p);
        }

        let Some(spec) = chars.next() else {
            break;
        };
        if spec == '%' {
            written += emit(&mut state.output, format_args!("%"));
            continue;
        }

        let value = values.next().map_or(0.0, |e| eval(e, state, strings));
        let out = &mut state.output;
        written += match spec {
            'd' | 'i' => emit(out, format_args!("{:>width$}", value as i64)),
            'x' | 'X' => emit(out, format_args!("{:>width$x}", value as i64)),
            'f' => emit(
                out,
                format_args!("{:>width$.prec$}", value, prec = precision.unwrap_or(6)),
            ),
            's' => match string_handle(value, strings) {
                Some(text) => emit(out, format_args!("{text:>width$}")),
                None => emit(out, format_args!("{value:>width$}")),
            },
            'g' => emit(out, format_args!("{value:>width$}")),
            other => emit(out, format_args!("%{other}")),
        };
    }

    written as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm(source: &str) -> ScriptVm {
        let mut vm = ScriptVm::new(Program::compile(source).unwrap(), 48000.0);
        vm.run_init();
        vm
    }

    fn value(source: &str, name: &str) -> f64 {
        vm(source).variable(name).unwrap()
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(value("@init\nx = 1 + 2 * 3 ^ 2;", "x"), 19.0);
        assert_eq!(value("@init\nx = -2 ^ 2;", "x"), 4.0);
        assert_eq!(value("@init\nx = 7 % 3;", "x"), 1.0);
        assert_eq!(value("@init\nx = 7 % 0;", "x"), 0.0);
        assert_eq!(value("@init\nx = 6 | 1 & 3;", "x"), 7.0);
    }

    #[test]
    fn compound_assignment_chains() {
        assert_eq!(value("@init\nx = 2; x += 3; x *= 2; x -= 1; x /= 3;", "x"), 3.0);
        assert_eq!(value("@init\na = b = 4;", "a"), 4.0);
    }

    #[test]
    fn comparison_uses_tolerance() {
        assert_eq!(value("@init\nx = 0.1 + 0.2 == 0.3;", "x"), 1.0);
        assert_eq!(value("@init\nx = 1 != 1.000001;", "x"), 0.0);
    }

    #[test]
    fn logic_short_circuits() {
        assert_eq!(value("@init\nx = 0 && (y = 5);", "y"), 0.0);
        assert_eq!(value("@init\nx = 1 || (y = 5);", "y"), 0.0);
        assert_eq!(value("@init\nx = 1 ? 2 : 3;", "x"), 2.0);
        assert_eq!(value("@init\nx = !0;", "x"), 1.0);
    }

    #[test]
    fn sequences_yield_last_value() {
        assert_eq!(value("@init\nx = (a = 1; a + 1);", "x"), 2.0);
    }

    #[test]
    fn variables_are_case_insensitive() {
        let vm = vm("@init\nGain = 3;");
        assert_eq!(vm.variable("gain"), Some(3.0));
        assert_eq!(vm.variable("GAIN"), Some(3.0));
    }

    #[test]
    fn memory_indexing() {
        let vm = vm("@init\nbuf = 100; buf[2] = 5; x = buf[2]; y = buf[-1000]; buf[999999] = 1;");
        assert_eq!(vm.memory(102), 5.0);
        assert_eq!(vm.variable("x"), Some(5.0));
        assert_eq!(vm.variable("y"), Some(0.0));
    }

    #[test]
    fn loops_are_bounded() {
        assert_eq!(value("@init\ni = 0; loop(10, i += 1);", "i"), 10.0);
        assert_eq!(value("@init\ni = 0; while(i += 1; i < 5);", "i"), 5.0);
        assert_eq!(
            value("@init\ni = 0; while(i += 1);", "i"),
            MAX_LOOP_ITERATIONS as f64
        );
    }

    #[test]
    fn nested_loops_share_one_budget() {
        let source = "@init\nx = 0; loop(1048576, loop(1048576, x += 1));";
        assert_eq!(value(source, "x"), (MAX_LOOP_ITERATIONS - 1) as f64);
    }

    #[test]
    fn loop_budget_resets_every_frame() {
        let mut vm = vm("@sample\nn = 0; loop(2000000, n += 1); total += n;");
        vm.process(0.0, 0.0);
        vm.process(0.0, 0.0);
        assert_eq!(vm.variable("n"), Some(MAX_LOOP_ITERATIONS as f64));
        assert_eq!(vm.variable("total"), Some(2.0 * MAX_LOOP_ITERATIONS as f64));
    }

    #[test]
    fn modulo_of_extreme_values_does_not_overflow() {
        assert_eq!(value("@init\nx = -1e30 % -1;", "x"), 0.0);
        let mut vm = vm("@sample\nspl0 = -1e30 % -1;\nspl1 = spl1 % -1;");
        assert_eq!(vm.process(0.1, 0.1), (0.0, 0.0));
    }

    #[test]
    fn builtins() {
        assert_eq!(value("@init\nx = max(2, min(5, 3));", "x"), 3.0);
        assert_eq!(value("@init\nx = sign(-4) + abs(-2);", "x"), 1.0);
        assert!((value("@init\nx = sin($pi / 2);", "x") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sample_section_processes_frames() {
        let mut vm = vm("@init\ng = 0.5;\n@sample\nspl0 = spl0 * g;\nspl1 = -spl1;");
        assert_eq!(vm.process(1.0, 0.25), (0.5, -0.25));
    }

    #[test]
    fn missing_sample_section_passes_through() {
        let mut vm = vm("@init\ng = 1;");
        assert_eq!(vm.process(0.3, -0.7), (0.3, -0.7));
    }

    #[test]
    fn sample_rate_change_reruns_init() {
        let mut vm = vm("@init\nnyquist = srate / 2;");
        assert_eq!(vm.variable("nyquist"), Some(24000.0));
        vm.set_sample_rate(44100.0);
        assert_eq!(vm.variable("nyquist"), Some(22050.0));
    }

    #[test]
    fn printf_formats_into_output() {
        let mut vm = vm("@init\nx = 3; printf(\"x=%d y=%.2f %s %x 100%%\", x, 1.5, \"ok\", 255);");
        assert_eq!(vm.take_output().as_deref(), Some("x=3 y=1.50 ok ff 100%"));
        assert_eq!(vm.take_output(), None);
    }

    #[test]
    fn printf_output_is_bounded() {
        let mut vm = vm("@init\nloop(5000, printf(\"ab\"));");
        let text = vm.take_output().unwrap();
        assert_eq!(text.len(), OUTPUT_CAPACITY);
    }

    #[test]
    fn string_variables_are_recognisable() {
        let vm = vm("@init\nname = \"hello\"; n = 2;");
        let name = vm.variable("name").unwrap();
        assert_eq!(vm.string_for(name), Some("hello"));
        assert_eq!(vm.string_for(2.0), None);
    }

    #[test]
    fn set_variable_rejects_unknown_names() {
        let mut vm = vm("@init\ng = 1;");
        assert!(vm.set_variable("G", 2.0));
        assert_eq!(vm.variable("g"), Some(2.0));
        assert!(!vm.set_variable("nope", 2.0));
    }
}
