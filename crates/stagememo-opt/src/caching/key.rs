//! Cache key layout and the code that builds, looks up and stores it.

use std::fmt;

use stagememo_ir::{
    CallKind, Expression, Function, Handle, Intrinsic, IrError, Literal, Module, Scalar, Statement,
};

use super::CacheConfig;
use super::dependencies::{
    DependencyCollector, DependencyInfo, DependencyKey, DependencySet, DependencyValue,
};
use crate::error::CacheError;

/// Bytes used by each name's length prefix.
const LENGTH_BYTES: u32 = 4;

/// Upper bound on the alignment of the dependency block.
const MAX_ALIGNMENT: u32 = 32;

/// One region of the key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyField {
    /// 32-bit length of the name that follows.
    Length(u32),
    /// Raw bytes of a name, without terminator.
    Name(String),
    /// Zero bytes.
    Padding(u32),
    /// The native representation of one dependency.
    Dependency(DependencyKey, DependencyInfo),
}

impl KeyField {
    /// Bytes this field occupies.
    pub fn size(&self) -> u32 {
        match self {
            Self::Length(_) => LENGTH_BYTES,
            Self::Name(name) => name.len() as u32,
            Self::Padding(n) => *n,
            Self::Dependency(key, _) => key.size,
        }
    }
}

/// A field at its byte offset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacedField {
    pub offset: u32,
    pub field: KeyField,
}

/// Byte plan of a cache key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyLayout {
    fields: Vec<PlacedField>,
    size: u32,
    alignment: u32,
}

impl KeyLayout {
    /// Lays out the key for `stage` of `pipeline` with the given dependencies.
    pub fn compute(pipeline: &str, stage: &str, deps: &DependencySet) -> Result<Self, CacheError> {
        let max_size = deps.keys().map(|k| k.size).max().unwrap_or(0);
        let alignment = alignment_for(max_size);

        let mut builder = LayoutBuilder::default();
        builder.name(pipeline);
        builder.pad_to(LENGTH_BYTES);
        builder.name(stage);
        builder.pad_to(alignment);
        for (key, info) in deps {
            builder.push(KeyField::Dependency(key.clone(), info.clone()));
        }

        let size = u32::try_from(builder.offset)
            .ok()
            .filter(|&size| i32::try_from(size).is_ok())
            .ok_or_else(|| CacheError::KeyTooLarge {
                stage: stage.to_string(),
            })?;

        Ok(Self {
            fields: builder.fields,
            size,
            alignment,
        })
    }

    /// Total key size in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Alignment of the first dependency field.
    pub fn alignment(&self) -> u32 {
        self.alignment
    }

    /// All fields in write order.
    pub fn fields(&self) -> &[PlacedField] {
        &self.fields
    }

    /// Offset of the field holding `key`.
    pub fn dependency_offset(&self, key: &DependencyKey) -> Option<u32> {
        self.fields.iter().find_map(|placed| match &placed.field {
            KeyField::Dependency(k, _) if k == key => Some(placed.offset),
            _ => None,
        })
    }
}

impl fmt::Display for KeyLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} bytes, dependency alignment {}", self.size, self.alignment)?;
        for placed in &self.fields {
            let what = match &placed.field {
                KeyField::Length(n) => format!("length = {n}"),
                KeyField::Name(name) => format!("name {name:?}"),
                KeyField::Padding(_) => "padding".to_string(),
                KeyField::Dependency(key, _) => format!("dependency {}", key.name),
            };
            writeln!(f, "  {:>6} {:>4}  {what}", placed.offset, placed.field.size())?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct LayoutBuilder {
    fields: Vec<PlacedField>,
    /// Running absolute offset, wide enough to detect overflow.
    offset: u64,
}

impl LayoutBuilder {
    fn push(&mut self, field: KeyField) {
        let size = u64::from(field.size());
        self.fields.push(PlacedField {
            offset: self.offset as u32,
            field,
        });
        self.offset += size;
    }

    fn name(&mut self, name: &str) {
        self.push(KeyField::Length(name.len() as u32));
        self.push(KeyField::Name(name.to_string()));
    }

    fn pad_to(&mut self, alignment: u32) {
        let pad = padding(self.offset, alignment);
        if pad > 0 {
            self.push(KeyField::Padding(pad));
        }
    }
}

/// Smallest power of two that holds `max_size`, capped at [`MAX_ALIGNMENT`].
pub(crate) fn alignment_for(max_size: u32) -> u32 {
    let mut alignment = 1;
    while alignment < MAX_ALIGNMENT && alignment < max_size {
        alignment <<= 1;
    }
    alignment
}

/// Zero bytes needed to move `offset` to a multiple of `alignment`.
pub(crate) fn padding(offset: u64, alignment: u32) -> u32 {
    let alignment = u64::from(alignment.max(1));
    ((alignment - offset % alignment) % alignment) as u32
}

/// Plans and emits the cache key code for one stage.
#[derive(Debug)]
pub struct CacheKeyPlanner {
    pipeline_name: String,
    stage_name: String,
    dependencies: DependencySet,
    layout: KeyLayout,
    config: CacheConfig,
}

impl CacheKeyPlanner {
    /// Collects the dependencies of `function` and lays out its key.
    pub fn new(
        module: &Module,
        function: Handle<Function>,
        pipeline_name: &str,
    ) -> Result<Self, CacheError> {
        let stage_name = module
            .functions
            .try_get(function)
            .ok_or(IrError::BadHandle {
                index: function.index(),
                size: module.functions.len(),
            })?
            .name
            .clone();
        let dependencies = DependencyCollector::collect(module, function)?;
        let layout = KeyLayout::compute(pipeline_name, &stage_name, &dependencies)?;
        log::debug!(
            "cache key for '{stage_name}' ({} dependencies): {layout}",
            dependencies.len()
        );

        Ok(Self {
            pipeline_name: pipeline_name.to_string(),
            stage_name,
            dependencies,
            layout,
            config: CacheConfig::default(),
        })
    }

    /// Uses `config` for the runtime symbols.
    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    pub fn dependencies(&self) -> &DependencySet {
        &self.dependencies
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    /// Total key size in bytes.
    pub fn key_size(&self) -> u32 {
        self.layout.size
    }

    /// The key size as an `i32` literal.
    pub fn key_size_expr(&self, module: &mut Module) -> Handle<Expression> {
        module.literal(Literal::I32(self.layout.size as i32))
    }

    /// Emits the statements that fill `key_buffer`, in layout order.
    pub fn generate_key(&self, module: &mut Module, key_buffer: &str) -> Statement {
        let mut writes = Vec::new();

        for placed in &self.layout.fields {
            let offset = placed.offset;
            match &placed.field {
                KeyField::Length(len) => {
                    let value = module.literal(Literal::I32(*len as i32));
                    writes.push(store(module, key_buffer, offset, value));
                }
                KeyField::Name(name) => {
                    writes.push(copy_name(module, key_buffer, offset, name));
                }
                KeyField::Padding(count) => {
                    for byte in 0..*count {
                        let zero = module.literal(Literal::U8(0));
                        writes.push(store(module, key_buffer, offset + byte, zero));
                    }
                }
                KeyField::Dependency(key, info) => {
                    let value = match info.value {
                        DependencyValue::Parameter(param) => module.append(Expression::Variable {
                            name: key.name.clone(),
                            ty: info.ty,
                            param: Some(param),
                        }),
                        DependencyValue::Expression(expr) => expr,
                    };
                    writes.push(store(module, key_buffer, offset, value));
                }
            }
        }

        Statement::Block(writes)
    }

    /// Emits the lookup call. It yields `true` when the result must be computed.
    pub fn generate_lookup(
        &self,
        module: &mut Module,
        key_buffer: &str,
        result_buffer: &str,
    ) -> Handle<Expression> {
        let symbol = self.config.lookup_symbol.clone();
        self.runtime_call(module, symbol, key_buffer, result_buffer)
    }

    /// Emits the call that stores `result_buffer` under the key.
    pub fn store_computation(
        &self,
        module: &mut Module,
        key_buffer: &str,
        result_buffer: &str,
    ) -> Statement {
        let symbol = self.config.store_symbol.clone();
        Statement::Evaluate(self.runtime_call(module, symbol, key_buffer, result_buffer))
    }

    fn runtime_call(
        &self,
        module: &mut Module,
        symbol: String,
        key_buffer: &str,
        result_buffer: &str,
    ) -> Handle<Expression> {
        let context = handle_var(module, &self.config.context_symbol);
        let key = handle_var(module, key_buffer);
        let size = self.key_size_expr(module);
        let result = handle_var(module, result_buffer);
        module.append(Expression::Call {
            ty: Scalar::BOOL,
            kind: CallKind::Extern(symbol),
            args: vec![context, key, size, result],
            param: None,
        })
    }
}

fn store(module: &mut Module, buffer: &str, offset: u32, value: Handle<Expression>) -> Statement {
    let index = module.literal(Literal::I32(offset as i32));
    Statement::Store {
        buffer: buffer.to_string(),
        index,
        value,
    }
}

/// `copy_memory(address_of(buffer[offset]), "name", len)`
fn copy_name(module: &mut Module, buffer: &str, offset: u32, name: &str) -> Statement {
    let index = module.literal(Literal::I32(offset as i32));
    let byte = module.append(Expression::Load {
        ty: Scalar::U8,
        buffer: buffer.to_string(),
        index,
        param: None,
    });
    let dest = module.append(Expression::Call {
        ty: Scalar::HANDLE,
        kind: CallKind::Intrinsic(Intrinsic::AddressOf),
        args: vec![byte],
        param: None,
    });
    let src = module.append(Expression::StringImm(name.to_string()));
    let len = module.literal(Literal::I32(name.len() as i32));
    let copy = module.append(Expression::Call {
        ty: Scalar::HANDLE,
        kind: CallKind::Intrinsic(Intrinsic::CopyMemory),
        args: vec![dest, src, len],
        param: None,
    });
    Statement::Evaluate(copy)
}

fn handle_var(module: &mut Module, name: &str) -> Handle<Expression> {
    module.append(Expression::Variable {
        name: name.to_string(),
        ty: Scalar::HANDLE,
        param: None,
    })
}
