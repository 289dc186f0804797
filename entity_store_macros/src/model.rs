use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    braced,
    parse::{Parse, ParseStream},
    Attribute, Expr, Ident, LitStr, Token, Type,
};

pub struct ModelInput {
    attrs: Vec<Attribute>,
    model_name: Ident,
    fields: Vec<FieldDef>,
}

struct FieldDef {
    name: Ident,
    ty: Type,
    default: Option<Expr>,
}

impl Parse for ModelInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        let model_name: Ident = input.parse()?;

        let content;
        braced!(content in input);

        let mut fields = Vec::new();
        while !content.is_empty() {
            let name: Ident = content.parse()?;
            content.parse::<Token![:]>()?;
            let ty: Type = content.parse()?;

            // Optional `= default`
            let default = if content.peek(Token![=]) {
                content.parse::<Token![=]>()?;
                Some(content.parse()?)
            } else {
                None
            };

            if fields.iter().any(|f: &FieldDef| f.name == name) {
                return Err(syn::Error::new(name.span(), "field declared twice"));
            }
            fields.push(FieldDef { name, ty, default });

            // Optional trailing comma
            if content.peek(Token![,]) {
                content.parse::<Token![,]>()?;
            }
        }

        Ok(ModelInput {
            attrs,
            model_name,
            fields,
        })
    }
}

fn is_bool(ty: &Type) -> bool {
    matches!(ty, Type::Path(path) if path.qself.is_none() && path.path.is_ident("bool"))
}

pub fn expand(input: ModelInput) -> TokenStream {
    let attrs = &input.attrs;
    let model_name = &input.model_name;
    let type_tag = LitStr::new(&model_name.to_string(), model_name.span());

    let accessors = input.fields.iter().map(|field| {
        let name = &field.name;
        let ty = &field.ty;
        let key = LitStr::new(&name.to_string(), name.span());
        let has_fn = format_ident!("has_{}", name);
        let set_fn = format_ident!("set_{}", name);

        let read_fn = if is_bool(ty) {
            let is_fn = format_ident!("is_{}", name);
            quote! {
                pub fn #is_fn(&self) -> bool {
                    self.record.get_as::<bool>(#key).unwrap_or(false)
                }
            }
        } else {
            let get_fn = format_ident!("get_{}", name);
            quote! {
                pub fn #get_fn(&self) -> ::core::option::Option<#ty> {
                    self.record.get_as::<#ty>(#key)
                }
            }
        };

        quote! {
            #read_fn

            pub fn #has_fn(&self) -> bool {
                self.record.has(#key)
            }

            pub fn #set_fn(&self, value: impl ::core::convert::Into<#ty>) -> bool {
                let value: #ty = value.into();
                self.record
                    .set(#key, <#ty as entity_store::FieldValue>::into_value(value))
            }
        }
    });

    let defaults = input.fields.iter().map(|field| {
        let key = LitStr::new(&field.name.to_string(), field.name.span());
        let value = match &field.default {
            Some(expr) => quote! { entity_store::Value::from(#expr) },
            None => quote! { entity_store::Value::Null },
        };
        quote! {
            fields.insert(::std::string::String::from(#key), #value);
        }
    });

    quote! {
        #(#attrs)*
        #[derive(Clone, Debug)]
        pub struct #model_name {
            record: entity_store::RecordRef,
        }

        impl #model_name {
            /// Construct a detached record of this type from seed fields.
            pub fn create(
                id: &str,
                seed: entity_store::Fields,
            ) -> entity_store::StoreResult<Self> {
                let factory = entity_store::DefinitionFactory::<Self>::new();
                entity_store::instantiate(&factory, id, seed, ::core::option::Option::None)
                    .map(<Self as entity_store::ModelDefinition>::wrap)
            }

            pub fn record(&self) -> &entity_store::RecordRef {
                &self.record
            }

            pub fn into_record(self) -> entity_store::RecordRef {
                self.record
            }

            pub fn id(&self) -> &str {
                self.record.id()
            }

            #(#accessors)*
        }

        impl entity_store::ModelDefinition for #model_name {
            const TYPE: &'static str = #type_tag;

            fn default_state() -> entity_store::Fields {
                #[allow(unused_mut)]
                let mut fields = entity_store::Fields::new();
                #(#defaults)*
                fields
            }

            fn wrap(record: entity_store::RecordRef) -> Self {
                Self { record }
            }
        }

        impl entity_store::FieldValue for #model_name {
            fn from_value(value: &entity_store::Value) -> ::core::option::Option<Self> {
                value
                    .as_record()
                    .cloned()
                    .and_then(<Self as entity_store::ModelDefinition>::cast)
            }

            fn into_value(self) -> entity_store::Value {
                entity_store::Value::Record(self.record)
            }
        }

        impl ::core::convert::From<#model_name> for entity_store::Value {
            fn from(model: #model_name) -> Self {
                entity_store::Value::Record(model.record)
            }
        }
    }
}
