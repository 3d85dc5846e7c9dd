//! Turns declared signatures into [`ParameterSchema`]s.

use crate::catalog::Catalog;
use crate::error::IntrospectionError;
use crate::schema::{
    ParamDecl, ParamKind, ParamType, Parameter, ParameterSchema, Signature, TypeRef,
};

/// How many levels of abstract-typed parameters are expanded.
pub const MAX_NESTING_DEPTH: usize = 1;

/// Name under which variadic captures are recorded.
pub const VARIADIC_NAME: &str = "kwargs";

/// Introspect the constructor of a registered type.
pub fn inspect_constructor(
    catalog: &Catalog,
    type_name: &str,
) -> Result<ParameterSchema, IntrospectionError> {
    inspect_type(catalog, type_name, 0)
}

/// Introspect an arbitrary signature, resolving named types against `catalog`.
pub fn inspect_signature(
    catalog: &Catalog,
    signature: &Signature,
) -> Result<ParameterSchema, IntrospectionError> {
    inspect_at(catalog, signature, 0)
}

fn inspect_type(
    catalog: &Catalog,
    type_name: &str,
    depth: usize,
) -> Result<ParameterSchema, IntrospectionError> {
    let info = catalog
        .get(type_name)
        .ok_or_else(|| IntrospectionError::UnknownType(type_name.to_string()))?;
    let signature =
        (info.signature)().ok_or_else(|| IntrospectionError::NoSignature(type_name.to_string()))?;
    inspect_at(catalog, &signature, depth)
}

fn inspect_at(
    catalog: &Catalog,
    signature: &Signature,
    depth: usize,
) -> Result<ParameterSchema, IntrospectionError> {
    let mut params = Vec::with_capacity(signature.params.len());
    let mut seen_variadic = false;

    for decl in &signature.params {
        match decl.kind {
            ParamKind::Receiver => continue,
            ParamKind::VarPositional | ParamKind::VarKeyword => {
                if !seen_variadic {
                    seen_variadic = true;
                    params.push(Parameter {
                        name: VARIADIC_NAME.to_string(),
                        ty: ParamType::Variadic,
                        default: decl.default.clone(),
                    });
                }
            }
            ParamKind::Positional => params.push(Parameter {
                name: decl.name.clone(),
                ty: param_type(catalog, decl, depth)?,
                default: decl.default.clone(),
            }),
        }
    }

    Ok(ParameterSchema::new(params))
}

fn param_type(
    catalog: &Catalog,
    decl: &ParamDecl,
    depth: usize,
) -> Result<ParamType, IntrospectionError> {
    let ty = match decl.annotation {
        None => ParamType::Unannotated,
        Some(TypeRef::Primitive(primitive)) => ParamType::Primitive { primitive },
        Some(TypeRef::Named(name)) => {
            let expandable = depth < MAX_NESTING_DEPTH
                && catalog.get(name).is_some_and(|info| info.is_abstract);
            if expandable {
                ParamType::Nested {
                    type_name: name.to_string(),
                    schema: inspect_type(catalog, name, depth + 1)?,
                }
            } else {
                ParamType::Object {
                    type_name: name.to_string(),
                }
            }
        }
    };
    Ok(ty)
}
