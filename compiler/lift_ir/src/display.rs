//! Textual rendering of types and values.
//!
//! Used for diagnostics: when lowering rejects a value, the error carries
//! this rendering so the offending construct can be found in the input.

use std::fmt;

use crate::module::Module;
use crate::types::{Type, TypeId};
use crate::value::{Operand, ValueId, ValueKind};

/// Display adapter for a [`TypeId`].
pub struct TypeDisplay<'a> {
    module: &'a Module,
    ty: TypeId,
}

/// Display adapter for a [`ValueId`]. Instructions render as a full
/// statement; everything else renders as an operand reference.
pub struct ValueDisplay<'a> {
    module: &'a Module,
    value: ValueId,
}

impl Module {
    pub fn display_type(&self, ty: TypeId) -> TypeDisplay<'_> {
        TypeDisplay { module: self, ty }
    }

    pub fn display_value(&self, value: ValueId) -> ValueDisplay<'_> {
        ValueDisplay {
            module: self,
            value,
        }
    }
}

fn write_type(f: &mut fmt::Formatter<'_>, module: &Module, ty: TypeId) -> fmt::Result {
    match module.types.get(ty) {
        Type::Void => f.write_str("void"),
        Type::Int { bits } => write!(f, "i{bits}"),
        Type::Float => f.write_str("float"),
        Type::Double => f.write_str("double"),
        Type::Ptr => f.write_str("ptr"),
        Type::Array { element, len } => {
            write!(f, "[{len} x ")?;
            write_type(f, module, *element)?;
            f.write_str("]")
        }
        Type::Vector { element, len } => {
            write!(f, "<{len} x ")?;
            write_type(f, module, *element)?;
            f.write_str(">")
        }
        Type::Struct {
            name: Some(name), ..
        } => write!(f, "%{name}"),
        Type::Struct { name: None, fields } => {
            f.write_str("{ ")?;
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_type(f, module, *field)?;
            }
            f.write_str(" }")
        }
        Type::Function {
            ret,
            params,
            variadic,
        } => {
            write_type(f, module, *ret)?;
            f.write_str(" (")?;
            for (i, param) in params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_type(f, module, *param)?;
            }
            if *variadic {
                f.write_str(if params.is_empty() { "..." } else { ", ..." })?;
            }
            f.write_str(")")
        }
        Type::Label => f.write_str("label"),
        Type::Token => f.write_str("token"),
        Type::Metadata => f.write_str("metadata"),
    }
}

/// Render a value as an operand: `i32 7`, `ptr @g`, `%x`.
fn write_operand(f: &mut fmt::Formatter<'_>, module: &Module, id: ValueId) -> fmt::Result {
    let value = module.value(id);
    write_type(f, module, value.ty)?;
    f.write_str(" ")?;
    match &value.kind {
        ValueKind::ConstInt(v) => write!(f, "{v}"),
        ValueKind::ConstFloat(bits) => write!(f, "{:?}", f64::from_bits(*bits)),
        ValueKind::Null => f.write_str("null"),
        ValueKind::Zero => f.write_str("zeroinitializer"),
        ValueKind::Undef => f.write_str("undef"),
        ValueKind::Poison => f.write_str("poison"),
        ValueKind::Metadata => f.write_str("!{}"),
        ValueKind::ConstAggregate(elements) => {
            f.write_str("{ ")?;
            for (i, element) in elements.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_operand(f, module, *element)?;
            }
            f.write_str(" }")
        }
        ValueKind::ConstExpr(expr) => {
            write!(f, "{} (", expr.opcode.name())?;
            for (i, operand) in expr.operands.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_operand(f, module, *operand)?;
            }
            f.write_str(")")
        }
        ValueKind::Global(_) | ValueKind::Function(_) => {
            write!(f, "@{}", value.name.as_deref().unwrap_or("?"))
        }
        ValueKind::Argument { index, .. } => match &value.name {
            Some(name) => write!(f, "%{name}"),
            None => write!(f, "%arg{index}"),
        },
        ValueKind::Instruction(_) => write_local_name(f, module, id),
    }
}

fn write_local_name(f: &mut fmt::Formatter<'_>, module: &Module, id: ValueId) -> fmt::Result {
    match &module.value(id).name {
        Some(name) => write!(f, "%{name}"),
        None => write!(f, "%v{}", id.raw()),
    }
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type(f, self.module, self.ty)
    }
}

impl fmt::Display for ValueDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let module = self.module;
        let value = module.value(self.value);
        let ValueKind::Instruction(inst) = &value.kind else {
            return write_operand(f, module, self.value);
        };

        if !module.types.is_void(value.ty) {
            write_local_name(f, module, self.value)?;
            f.write_str(" = ")?;
        }
        f.write_str(inst.opcode.name())?;
        for (i, operand) in inst.operands.iter().enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            match operand {
                Operand::Value(v) => write_operand(f, module, *v)?,
                Operand::Block(b) => {
                    let function = module.function(inst.function);
                    match function.blocks.get(b.index()).and_then(|bl| bl.name.as_deref()) {
                        Some(name) => write!(f, "label %{name}")?,
                        None => write!(f, "label %bb{}", b.raw())?,
                    }
                }
            }
        }
        Ok(())
    }
}
