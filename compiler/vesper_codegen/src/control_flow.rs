//! Control-flow generation: `if` and `while`.

use vesper_reader::Expression;

use crate::env::ScopeId;
use crate::error::CodegenError;
use crate::generate::Generator;
use crate::ty::TypedValue;

impl Generator {
    /// `(if cond then else)` — both arms are always generated and their
    /// results merged with a phi; there is no dead-branch elision.
    pub(crate) fn gen_if(
        &mut self,
        items: &[Expression],
        scope: ScopeId,
    ) -> Result<TypedValue, CodegenError> {
        if items.len() != 4 {
            return Err(CodegenError::malformed(
                "if",
                format!("expected `(if cond then else)`, got {} elements", items.len()),
            ));
        }
        let cond = self.gen(&items[1], scope)?;

        let (then_block, else_block, merge_block) = {
            let mut bx = self.bx();
            let then_block = bx.append_block("then");
            let else_block = bx.append_block("else");
            let merge_block = bx.append_block("ifcont");
            bx.cond_br(cond.value, then_block, else_block);
            (then_block, else_block, merge_block)
        };

        // Nested control flow moves the insertion point, so the arm's
        // exit block is wherever generation finished, not the arm's
        // entry block.
        self.cursor.block = then_block;
        let then_val = self.gen(&items[2], scope)?;
        let then_exit = self.cursor.block;
        self.bx().br(merge_block);

        self.cursor.block = else_block;
        let else_val = self.gen(&items[3], scope)?;
        let else_exit = self.cursor.block;
        self.bx().br(merge_block);

        self.cursor.block = merge_block;
        let phi = self.bx().phi(
            then_val.desc.repr.clone(),
            &[(then_val.value, then_exit), (else_val.value, else_exit)],
            "iftmp",
        );
        Ok(TypedValue::new(phi, then_val.desc))
    }

    /// `(while cond body)` — no result value.
    pub(crate) fn gen_while(
        &mut self,
        items: &[Expression],
        scope: ScopeId,
    ) -> Result<TypedValue, CodegenError> {
        if items.len() != 3 {
            return Err(CodegenError::malformed(
                "while",
                format!("expected `(while cond body)`, got {} elements", items.len()),
            ));
        }
        let (cond_block, loop_block, after_block) = {
            let mut bx = self.bx();
            let cond_block = bx.append_block("cond");
            let loop_block = bx.append_block("loop");
            let after_block = bx.append_block("afterloop");
            bx.br(cond_block);
            (cond_block, loop_block, after_block)
        };

        self.cursor.block = cond_block;
        let cond = self.gen(&items[1], scope)?;
        self.bx().cond_br(cond.value, loop_block, after_block);

        self.cursor.block = loop_block;
        self.gen(&items[2], scope)?;
        self.bx().br(cond_block);

        self.cursor.block = after_block;
        Ok(TypedValue::zero())
    }
}
