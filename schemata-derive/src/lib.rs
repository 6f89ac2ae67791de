//! # Schemata Derive Macros
//!
//! Provides `#[derive(Schema)]`, which builds the field-descriptor table of a
//! struct once and converts between the struct and a `SchemaInstance`.
//!
//! Compatible with `syn 2.0`.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Derives `schemata::Schema`.
///
/// Struct attributes: `#[schema(name = "...", module = "...")]` override the
/// class name (default: the struct name) and module (default: `module_path!()`).
///
/// Field attributes: `desc`, `dtype` (e.g. `"float64"`, `"int32"`), `shape`
/// (e.g. `"2, 2"`) and `rename`.
#[proc_macro_derive(Schema, attributes(schema))]
pub fn derive_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

struct SchemaField {
    ident: syn::Ident,
    ty: syn::Type,
    name: String,
    desc: Option<String>,
    dtype: Option<syn::Ident>,
    shape: Option<Vec<usize>>,
}

#[derive(Default)]
struct StructAttrs {
    name: Option<String>,
    module: Option<String>,
}

fn expand(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let ident = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "Schema cannot be derived for generic structs",
        ));
    }

    let data_struct = match input.data {
        Data::Struct(ds) => ds,
        _ => return Err(syn::Error::new(ident.span(), "Schema only supports structs")),
    };
    let named = match data_struct.fields {
        Fields::Named(named) => named,
        _ => {
            return Err(syn::Error::new(
                ident.span(),
                "Schema only supports structs with named fields",
            ));
        }
    };

    let struct_attrs = parse_struct_attributes(&input.attrs)?;
    let mut fields = Vec::new();
    for field in named.named {
        let Some(field_ident) = field.ident.clone() else {
            continue;
        };
        fields.push(parse_field(field_ident, field.ty, &field.attrs)?);
    }

    let classname = struct_attrs.name.unwrap_or_else(|| ident.to_string());
    let module = match struct_attrs.module {
        Some(module) => quote! { #module },
        None => quote! { ::core::module_path!() },
    };

    let descriptors = fields.iter().map(|f| {
        let ty = &f.ty;
        let name = &f.name;
        let dtype = match &f.dtype {
            Some(variant) => quote! { ::core::option::Option::Some(schemata::DType::#variant) },
            None => quote! { ::core::option::Option::None },
        };
        let shape = match &f.shape {
            Some(dims) => quote! { ::core::option::Option::Some(::std::vec![#(#dims),*]) },
            None => quote! { ::core::option::Option::None },
        };
        let desc = match &f.desc {
            Some(desc) => quote! { ::core::option::Option::Some(#desc) },
            None => quote! { ::core::option::Option::None },
        };
        quote! {
            .field(schemata::schema::field_descriptor::<#ty>(#name, #dtype, #shape, #desc))
        }
    });

    let assigns = fields.iter().map(|f| {
        let fident = &f.ident;
        let name = &f.name;
        quote! {
            instance.assign(#name, schemata::FieldValue::to_value(&self.#fident))?;
        }
    });

    let takes = fields.iter().map(|f| {
        let fident = &f.ident;
        let ty = &f.ty;
        let name = &f.name;
        quote! {
            #fident: <#ty as schemata::FieldValue>::from_value(#name, instance.take(#name)?)?,
        }
    });

    Ok(quote! {
        impl schemata::Schema for #ident {
            fn definition() -> ::std::sync::Arc<schemata::SchemaDef> {
                static DEFINITION: ::std::sync::OnceLock<::std::sync::Arc<schemata::SchemaDef>> =
                    ::std::sync::OnceLock::new();
                ::std::sync::Arc::clone(DEFINITION.get_or_init(|| {
                    schemata::SchemaDef::builder(#classname, #module)
                        #(#descriptors)*
                        .build()
                }))
            }

            fn to_instance(&self) -> schemata::Result<schemata::SchemaInstance> {
                let mut instance =
                    schemata::SchemaInstance::new(<Self as schemata::Schema>::definition());
                #(#assigns)*
                ::core::result::Result::Ok(instance)
            }

            fn from_instance(
                mut instance: schemata::SchemaInstance,
            ) -> schemata::Result<Self> {
                ::core::result::Result::Ok(Self {
                    #(#takes)*
                })
            }
        }
    })
}

fn parse_struct_attributes(attrs: &[Attribute]) -> syn::Result<StructAttrs> {
    let mut out = StructAttrs::default();
    for attr in attrs {
        if attr.path().is_ident("schema") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let s: LitStr = meta.value()?.parse()?;
                    out.name = Some(s.value());
                    return Ok(());
                }
                if meta.path.is_ident("module") {
                    let s: LitStr = meta.value()?.parse()?;
                    out.module = Some(s.value());
                    return Ok(());
                }
                Err(meta.error("Unknown schema attribute key. Supported: name, module"))
            })?;
        }
    }
    Ok(out)
}

fn parse_field(ident: syn::Ident, ty: syn::Type, attrs: &[Attribute]) -> syn::Result<SchemaField> {
    let mut field = SchemaField {
        name: ident.to_string(),
        ident,
        ty,
        desc: None,
        dtype: None,
        shape: None,
    };

    for attr in attrs {
        if attr.path().is_ident("schema") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("desc") {
                    let s: LitStr = meta.value()?.parse()?;
                    field.desc = Some(s.value());
                    return Ok(());
                }
                if meta.path.is_ident("rename") {
                    let s: LitStr = meta.value()?.parse()?;
                    field.name = s.value();
                    return Ok(());
                }
                if meta.path.is_ident("dtype") {
                    let s: LitStr = meta.value()?.parse()?;
                    let variant = dtype_variant(&s.value())
                        .ok_or_else(|| syn::Error::new(s.span(), "Unknown dtype name"))?;
                    field.dtype = Some(syn::Ident::new(variant, Span::call_site()));
                    return Ok(());
                }
                if meta.path.is_ident("shape") {
                    let s: LitStr = meta.value()?.parse()?;
                    field.shape = Some(parse_shape(&s)?);
                    return Ok(());
                }
                Err(meta.error(
                    "Unknown schema attribute key. Supported: desc, dtype, shape, rename",
                ))
            })?;
        }
    }
    Ok(field)
}

/// Maps a dtype name to its `DType` variant. Mirrors `DType::from_name`.
fn dtype_variant(name: &str) -> Option<&'static str> {
    let variant = match name.to_ascii_lowercase().as_str() {
        "bool" | "b1" => "Bool",
        "int8" | "i8" | "i1" => "I8",
        "int16" | "i16" | "i2" => "I16",
        "int32" | "i32" | "i4" => "I32",
        "int64" | "i64" | "int" => "I64",
        "uint8" | "u8" | "u1" => "U8",
        "uint16" | "u16" | "u2" => "U16",
        "uint32" | "u32" | "u4" => "U32",
        "uint64" | "u64" => "U64",
        "float32" | "f32" | "f4" => "F32",
        "float64" | "f64" | "f8" | "float" => "F64",
        "bytes" | "s" => "Bytes",
        "unicode" | "str" | "string" | "u" => "Unicode",
        _ => return None,
    };
    Some(variant)
}

/// Parses `"2, 2"` (or `"(2, 2)"`) into dimensions. An empty string is 0-d.
fn parse_shape(lit: &LitStr) -> syn::Result<Vec<usize>> {
    let text = lit.value();
    let text = text.trim().trim_start_matches('(').trim_end_matches(')');
    text.split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| {
            dim.parse::<usize>()
                .map_err(|_| syn::Error::new(lit.span(), format!("Invalid dimension '{dim}'")))
        })
        .collect()
}
