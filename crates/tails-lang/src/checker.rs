//! The stack-effect checker: a forward abstract interpreter over the
//! compiler's IR.
//!
//! The checker simulates the runtime stack symbolically, carrying a type (or
//! literal value) for every slot. It verifies each instruction's input
//! typing, computes per-point depth, merges states where control flows join,
//! and infers or validates the word's overall stack effect.

use smallvec::smallvec;

use tails_core::{
    CompileError, CompileResult, Opcode, Param, Span, StackEffect, TypeSet, Value, ValueType,
    WordFlags,
};

use crate::compiler::Compiler;

fn spanned(err: CompileError, span: Option<Span>) -> CompileError {
    match span {
        Some(s) => err.with_span(s),
        None => err,
    }
}

/// One simulated stack slot: either a known literal value or a set of types.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TypeItem {
    Literal(Value),
    Types(TypeSet),
}

impl TypeItem {
    pub(crate) fn types(&self) -> TypeSet {
        match self {
            TypeItem::Literal(v) => TypeSet::of(v.value_type()),
            TypeItem::Types(t) => *t,
        }
    }

    /// The effect of a literal quotation, when this slot holds one.
    fn quote_effect(&self) -> Option<StackEffect> {
        match self {
            TypeItem::Literal(Value::Quote(word)) => word.effect().cloned(),
            _ => None,
        }
    }

    fn union_with(&self, other: &TypeItem) -> TypeItem {
        if self == other {
            self.clone()
        } else {
            TypeItem::Types(self.types().union(other.types()))
        }
    }
}

/// Simulates the runtime stack at compile time.
///
/// `max` tracks the peak absolute depth of the word's frame;
/// `usize::MAX` means "unbounded" (non-tail recursion).
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct EffectStack {
    stack: Vec<TypeItem>,
    initial: usize,
    max: usize,
}

impl EffectStack {
    pub(crate) fn from_effect(effect: &StackEffect) -> Self {
        let mut stack = Vec::with_capacity(effect.input_count());
        for entry in effect.inputs().iter().rev() {
            stack.push(TypeItem::Types(*entry));
        }
        let initial = stack.len();
        Self {
            stack,
            initial,
            max: initial,
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.stack.len()
    }

    fn max_depth(&self) -> usize {
        self.max
    }

    /// Slot at depth `i`; 0 is the top of the stack.
    fn at(&self, i: usize) -> CompileResult<&TypeItem> {
        if i >= self.stack.len() {
            return Err(CompileError::new("stack underflow"));
        }
        Ok(&self.stack[self.stack.len() - 1 - i])
    }

    fn push_item(&mut self, item: TypeItem) {
        self.stack.push(item);
        if self.max != usize::MAX && self.stack.len() > self.max {
            self.max = self.stack.len();
        }
    }

    fn pop(&mut self) -> CompileResult<TypeItem> {
        self.stack.pop().ok_or_else(|| CompileError::new("stack underflow"))
    }

    /// Pushes a copy of the slot at depth `n`.
    fn over(&mut self, n: usize) -> CompileResult<()> {
        let item = self.at(n)?.clone();
        self.push_item(item);
        Ok(())
    }

    /// General rotation; positive `n` lifts the slot at depth `n` to the top,
    /// negative `n` buries the top at depth `-n`.
    fn rotate(&mut self, n: i32) -> CompileResult<()> {
        if n == 0 {
            return Ok(());
        }
        let len = self.stack.len();
        let depth = n.unsigned_abs() as usize;
        if depth >= len {
            return Err(CompileError::new("stack underflow"));
        }
        if n > 0 {
            let item = self.stack.remove(len - 1 - depth);
            self.stack.push(item);
        } else {
            let item = self.pop()?;
            self.stack.insert(len - 1 - depth, item);
        }
        Ok(())
    }

    /// Inserts a type at the bottom of the stack. Used while deducing inputs.
    fn add_at_bottom(&mut self, entry: TypeSet) {
        self.stack.insert(0, TypeItem::Types(entry));
        self.initial += 1;
        if self.max != usize::MAX {
            self.max += 1;
        }
    }

    fn set_type_at(&mut self, i: usize, types: TypeSet) {
        let len = self.stack.len();
        self.stack[len - 1 - i] = TypeItem::Types(types);
    }

    /// Removes the slots at depths `[begin, end)`.
    fn erase(&mut self, begin: usize, end: usize) -> CompileResult<()> {
        debug_assert!(begin <= end);
        let len = self.stack.len();
        if end > len {
            return Err(CompileError::new("stack underflow"));
        }
        self.stack.drain(len - end..len - begin);
        Ok(())
    }

    /// Checks if every slot matches the allowed types; returns the offending
    /// extra types and their depth otherwise.
    fn type_check(&self, types: &[TypeSet]) -> CompileResult<Option<(TypeSet, usize)>> {
        for (i, allowed) in types.iter().enumerate() {
            let bad = self.at(i)?.types().minus(*allowed);
            if bad.exists() {
                return Ok(Some((bad, i)));
            }
        }
        Ok(None)
    }

    /// Applies the stack effect of calling a word: checks inputs, pops them,
    /// and pushes the outputs, resolving input-matched output slots.
    fn apply(&mut self, name: &str, effect: &StackEffect) -> CompileResult<()> {
        let n_inputs = effect.input_count();
        if n_inputs > self.depth() {
            return Err(CompileError::new(format!(
                "calling `{}` would underflow ({} needed, {} available)",
                name,
                n_inputs,
                self.depth()
            )));
        }
        if let Some((bad, i)) = self.type_check(effect.inputs())? {
            return Err(CompileError::new(format!(
                "type mismatch passing {} to `{}` (depth {})",
                bad, name, i
            )));
        }

        let inputs: Vec<TypeItem> = (0..n_inputs)
            .map(|i| self.at(i).map(Clone::clone))
            .collect::<CompileResult<_>>()?;

        if effect.max_is_unknown() {
            self.max = usize::MAX;
        } else if self.max != usize::MAX {
            let peak = self.depth() - n_inputs + effect.max() as usize;
            self.max = self.max.max(peak);
        }

        let keep = self.depth() - n_inputs;
        self.stack.truncate(keep);

        for i in (0..effect.output_count()).rev() {
            let entry = effect.outputs()[i];
            match entry.input_match() {
                Some(m) if m < n_inputs => self.push_item(inputs[m].clone()),
                _ => self.push_item(TypeItem::Types(entry)),
            }
        }
        Ok(())
    }

    /// Merges with the state arriving from another flow of control.
    fn merge_with(&mut self, other: &EffectStack) -> CompileResult<()> {
        if self.depth() != other.depth() {
            return Err(CompileError::new(format!(
                "inconsistent stack depth ({} vs {})",
                self.depth(),
                other.depth()
            )));
        }
        for (mine, theirs) in self.stack.iter_mut().zip(other.stack.iter()) {
            *mine = mine.union_with(theirs);
        }
        self.max = self.max.max(other.max);
        Ok(())
    }

    /// Checks the stack against a word's declared outputs at RETURN.
    /// With `can_add_outputs`, extra slots extend the effect and declared
    /// slots are broadened to the observed types.
    fn check_outputs(
        &self,
        effect: &mut StackEffect,
        can_add_outputs: bool,
    ) -> CompileResult<()> {
        let n_outputs = effect.output_count();
        let depth = self.depth();
        if n_outputs > depth {
            return Err(CompileError::new(format!(
                "insufficient outputs: have {}, declared {}",
                depth, n_outputs
            )));
        }
        if can_add_outputs {
            for i in 0..n_outputs {
                let merged = effect.outputs()[i].union(self.at(i)?.types());
                effect.outputs_mut()[i] = merged;
            }
        } else if let Some((bad, i)) = self.type_check(effect.outputs())? {
            return Err(CompileError::new(format!(
                "output type mismatch: can't return {} as {} (depth {})",
                bad,
                effect.outputs()[i],
                i
            )));
        }

        for i in n_outputs..depth {
            if !can_add_outputs {
                return Err(CompileError::new(format!(
                    "too many outputs: have {}, declared {}",
                    depth, n_outputs
                )));
            }
            effect.add_output_at_bottom(self.at(i)?.types());
        }
        Ok(())
    }
}

struct CheckContext {
    effect: StackEffect,
    can_add_inputs: bool,
    can_add_outputs: bool,
    flags: WordFlags,
}

/// Computes and validates the compiler's stack effect, updating it in place.
/// Also rewrites GETARG/SETARG offsets to be relative to the runtime top of
/// stack at their position.
pub(crate) fn compute_effect(c: &mut Compiler) -> CompileResult<()> {
    let mut ctx = CheckContext {
        effect: c.effect.clone(),
        can_add_inputs: c.can_add_inputs,
        can_add_outputs: c.can_add_outputs,
        flags: c.flags,
    };
    let initial = EffectStack::from_effect(&ctx.effect);
    walk(c, 0, initial, &mut ctx)?;
    if !ctx.effect.max_is_unknown() && ctx.effect.output_count() > ctx.effect.max() as usize {
        return Err(CompileError::new(
            "word declares more outputs than its peak stack depth",
        ));
    }
    c.effect = ctx.effect;
    c.can_add_outputs = false;
    Ok(())
}

fn walk(
    c: &mut Compiler,
    mut i: usize,
    mut cur: EffectStack,
    ctx: &mut CheckContext,
) -> CompileResult<()> {
    loop {
        if i >= c.words.len() {
            return Err(CompileError::new("branch past end of word"));
        }

        // Merge flows of control at branch destinations.
        if c.words[i].is_branch_dest {
            if let Some(known) = &c.words[i].known {
                if *known == cur {
                    return Ok(()); // this flow is already accounted for
                }
                let span = c.words[i].span;
                cur.merge_with(known).map_err(|e| spanned(e, span))?;
                c.words[i].known = Some(cur.clone());
            } else {
                c.words[i].known = Some(cur.clone());
            }
        }

        let op = c.words[i].op();
        let span = c.words[i].span;

        match op {
            Some(Opcode::Return) => {
                cur.check_outputs(&mut ctx.effect, ctx.can_add_outputs)
                    .map_err(|e| spanned(e, span))?;
                ctx.can_add_outputs = false;
                if cur.max_depth() == usize::MAX {
                    ctx.effect = ctx.effect.clone().with_unknown_max();
                } else if !ctx.effect.max_is_unknown() {
                    ctx.effect = ctx.effect.clone().with_max(cur.max_depth());
                }
                return Ok(());
            }
            Some(Opcode::Literal) => {
                let Param::Val(value) = &c.words[i].param else {
                    return Err(CompileError::new("LITERAL without a value parameter"));
                };
                cur.push_item(TypeItem::Literal(value.clone()));
            }
            Some(Opcode::Int) => {
                let n = int_param(c, i)?;
                cur.push_item(TypeItem::Literal(Value::number(n as f64)));
            }
            Some(Opcode::RotN) => {
                let n = int_param(c, i)?;
                cur.rotate(n).map_err(|e| spanned(e, span))?;
            }
            Some(Opcode::Locals) => {
                let n = int_param(c, i)?;
                for _ in 0..n {
                    // Type starts out empty; set by the first assignment.
                    cur.push_item(TypeItem::Types(TypeSet::none()));
                }
            }
            Some(Opcode::GetArg) | Some(Opcode::SetArg) => {
                check_arg(c, i, &mut cur, ctx).map_err(|e| spanned(e, span))?;
            }
            Some(Opcode::DropArgs) => {
                check_drop_args(c, i, &mut cur).map_err(|e| spanned(e, span))?;
            }
            Some(Opcode::Call) => {
                check_call(&mut cur, ctx).map_err(|e| spanned(e, span))?;
            }
            Some(Opcode::IfElse) => {
                check_ifelse(&mut cur, ctx).map_err(|e| spanned(e, span))?;
            }
            Some(Opcode::Recurse) => {
                check_recurse(c, i, &mut cur, ctx).map_err(|e| spanned(e, span))?;
            }
            _ => {
                let word = c.words[i].word.clone();
                let Some(effect) = word.effect().cloned() else {
                    return Err(spanned(
                        CompileError::new(format!(
                            "don't know the stack effect of `{}`",
                            word.name().unwrap_or("?")
                        )),
                        span,
                    ));
                };
                let name = word.name().unwrap_or("?").to_string();
                default_check(&name, &effect, &mut cur, ctx).map_err(|e| spanned(e, span))?;
            }
        }

        // Control flow.
        match op {
            Some(Opcode::Branch) => {
                let Some(dst) = c.words[i].branch_to else {
                    return Err(spanned(CompileError::new("branch without a target"), span));
                };
                i = dst;
            }
            Some(Opcode::ZBranch) => {
                let Some(dst) = c.words[i].branch_to else {
                    return Err(spanned(CompileError::new("branch without a target"), span));
                };
                // Follow the fall-through case first, then the branch.
                walk(c, i + 1, cur.clone(), ctx)?;
                i = dst;
            }
            _ => i += 1,
        }
    }
}

/// The default check: extend missing inputs if allowed, then apply the
/// word's declared effect.
fn default_check(
    name: &str,
    effect: &StackEffect,
    cur: &mut EffectStack,
    ctx: &mut CheckContext,
) -> CompileResult<()> {
    if ctx.can_add_inputs {
        // Compiling code with unknown inputs (a quotation): if the word needs
        // more inputs than are on the stack, they become inputs of this word.
        let available = cur.depth();
        for k in available..effect.input_count() {
            let entry = effect.inputs()[k];
            cur.add_at_bottom(entry);
            ctx.effect.add_input_at_bottom(entry);
        }
    }
    cur.apply(name, effect)
}

fn int_param(c: &Compiler, i: usize) -> CompileResult<i32> {
    match c.words[i].param {
        Param::Int(n) => Ok(n),
        _ => Err(CompileError::new("missing integer parameter")),
    }
}

// Handles both GETARG and SETARG. Rewrites the instruction's offset from a
// declaration-relative slot to a top-of-stack-relative one.
fn check_arg(
    c: &mut Compiler,
    i: usize,
    cur: &mut EffectStack,
    ctx: &mut CheckContext,
) -> CompileResult<()> {
    let is_get = c.words[i].op() == Some(Opcode::GetArg);
    let declared = int_param(c, i)?;
    let depth_past_inputs = cur.depth() as i32 - ctx.effect.input_count() as i32;

    if declared <= 0 {
        // Function argument. Slot 0 is the topmost argument.
        let slot = (-declared) as usize;
        if slot >= ctx.effect.input_count() {
            return Err(CompileError::new("argument reference out of range"));
        }
        if !c.words[i].adjusted {
            c.words[i].param = Param::Int(declared - depth_past_inputs);
            c.words[i].adjusted = true;
        }
        let param_type = ctx.effect.inputs()[slot];
        if is_get {
            cur.push_item(TypeItem::Types(param_type));
        } else {
            cur.apply(
                "_SETARG",
                &StackEffect::from_parts(smallvec![param_type], smallvec![]),
            )?;
        }
    } else {
        // Local variable. Slots are 1-based above the inputs.
        let adjusted = if c.words[i].adjusted {
            int_param(c, i)?
        } else {
            let adjusted = declared - depth_past_inputs;
            c.words[i].param = Param::Int(adjusted);
            c.words[i].adjusted = true;
            adjusted
        };
        let index = (-adjusted) as usize;
        if is_get {
            cur.over(index)?;
            if !cur.at(0)?.types().exists() {
                return Err(CompileError::new(
                    "reading local variable before it's assigned a value",
                ));
            }
        } else {
            let local_type = cur.at(index)?.types();
            let value_type = cur.at(0)?.types();
            if local_type.exists() {
                if value_type.minus(local_type).exists() {
                    return Err(CompileError::new("type mismatch assigning to local"));
                }
            } else {
                cur.set_type_at(index, value_type);
            }
            cur.pop()?;
        }
    }
    Ok(())
}

fn check_drop_args(c: &Compiler, i: usize, cur: &mut EffectStack) -> CompileResult<()> {
    let Param::Drop { locals, results } = c.words[i].param else {
        return Err(CompileError::new("DROPARGS without drop counts"));
    };
    let n_params = locals as usize;
    let n_results = results as usize;
    let Some(actual) = cur.depth().checked_sub(n_params) else {
        return Err(CompileError::new("stack underflow"));
    };
    if actual != n_results {
        return Err(CompileError::new(format!(
            "should return {} values, not {}",
            n_results, actual
        )));
    }
    cur.erase(n_results, n_results + n_params)
}

fn check_call(cur: &mut EffectStack, ctx: &mut CheckContext) -> CompileResult<()> {
    let callee = cur.pop()?;
    if callee.types() != TypeSet::of(ValueType::Quote) {
        return Err(CompileError::new(format!(
            "can't call a value of type {}",
            callee.types()
        )));
    }
    let Some(effect) = callee.quote_effect() else {
        return Err(CompileError::new("this quote's parameters aren't known"));
    };
    default_check("CALL", &effect, cur, ctx)
}

fn check_recurse(
    c: &Compiler,
    i: usize,
    cur: &mut EffectStack,
    ctx: &mut CheckContext,
) -> CompileResult<()> {
    if ctx.can_add_inputs || ctx.can_add_outputs {
        return Err(CompileError::new(
            "RECURSE requires an explicit stack effect declaration",
        ));
    }
    let mut effect = ctx.effect.clone();
    if !c.returns_immediately(c.next_active(i)) {
        if ctx.flags.contains(WordFlags::INLINE) {
            return Err(CompileError::new("illegal recursion in an inline word"));
        }
        effect = effect.with_unknown_max(); // non-tail recursion
    }
    default_check("RECURSE", &effect, cur, ctx)
}

// IFELSE needs its two quotations as literals so their effects are known.
fn check_ifelse(cur: &mut EffectStack, ctx: &mut CheckContext) -> CompileResult<()> {
    let a = cur
        .at(1)?
        .quote_effect()
        .ok_or_else(|| CompileError::new("IFELSE must be preceded by two quotations"))?;
    let b = cur
        .at(0)?
        .quote_effect()
        .ok_or_else(|| CompileError::new("IFELSE must be preceded by two quotations"))?;

    if a.net() != b.net() {
        return Err(CompileError::new(
            "IFELSE quotes have inconsistent stack depths",
        ));
    }

    let mut op_effect = a.clone();
    let a_inputs = a.input_count();
    for (slot, entry) in b.inputs().iter().enumerate() {
        if slot < a_inputs {
            let merged = entry.intersect(op_effect.inputs()[slot]);
            if !merged.exists() {
                return Err(CompileError::new(format!(
                    "IFELSE quotes have incompatible parameter #{}",
                    slot
                )));
            }
            op_effect.inputs_mut()[slot] = merged;
        } else {
            op_effect.add_input_at_bottom(*entry);
        }
    }
    let a_outputs = a.output_count();
    for (slot, entry) in b.outputs().iter().enumerate() {
        if slot < a_outputs {
            op_effect.outputs_mut()[slot] = op_effect.outputs()[slot].union(*entry);
        } else {
            op_effect.add_output_at_bottom(*entry);
        }
    }
    // Clear any input matches: the quote inputs no longer line up once the
    // test value and the quotes themselves are added below.
    for out in op_effect.outputs_mut() {
        out.clear_input_match();
    }

    // IFELSE's own inputs: the test value and the two quotations.
    op_effect.add_input(TypeSet::any());
    op_effect.add_input(TypeSet::of(ValueType::Quote));
    op_effect.add_input(TypeSet::of(ValueType::Quote));

    op_effect = if a.max_is_unknown() || b.max_is_unknown() {
        op_effect.with_unknown_max()
    } else {
        op_effect.with_max(a.max().max(b.max()) as usize)
    };
    default_check("IFELSE", &op_effect, cur, ctx)
}
