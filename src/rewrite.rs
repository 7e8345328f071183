//! Programs, edits, and rewriting object-initializer call sites to positional arguments.
//!
//! A [`Program`] is the symbol model plus the lowered bodies of every document. Edits never
//! touch a program in place: they are collected into a [`ProgramEdit`] and applied all at once,
//! producing a new program, or not at all.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::ir::{Body, Constant, IdGen, OpId, OpKind, Operation, Span};
use crate::symbols::{Model, SymbolId, Type};
use crate::{Error, Result};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct DocumentId(u32);

impl DocumentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Language {
    CSharp,
    VisualBasic,
}

impl Language {
    /// Guessed from a file name's extension; anything but `.vb` is C#.
    pub fn from_path(name: &str) -> Self {
        if name.to_ascii_lowercase().ends_with(".vb") {
            Language::VisualBasic
        } else {
            Language::CSharp
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub language: Language,
    pub bodies: Vec<Body>,
}

impl Document {
    pub fn new(name: impl Into<String>, language: Language) -> Self {
        Document {
            id: DocumentId::default(),
            name: name.into(),
            language,
            bodies: Vec::new(),
        }
    }

    pub fn body(&self, owner: SymbolId) -> Option<&Body> {
        self.bodies.iter().find(|b| b.owner == owner)
    }
}

#[derive(Clone, Default, Debug)]
pub struct Program {
    pub model: Model,
    pub documents: Vec<Document>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    pub fn add_document(&mut self, mut document: Document) -> DocumentId {
        let id = DocumentId(self.documents.len() as u32);
        document.id = id;
        self.documents.push(document);
        id
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(id.index())
    }

    pub fn document_mut(&mut self, id: DocumentId) -> Option<&mut Document> {
        self.documents.get_mut(id.index())
    }

    pub fn body(&self, owner: SymbolId) -> Option<&Body> {
        self.documents.iter().find_map(|d| d.body(owner))
    }

    pub fn document_of(&self, owner: SymbolId) -> Option<DocumentId> {
        self.documents
            .iter()
            .find(|d| d.body(owner).is_some())
            .map(|d| d.id)
    }

    /// The language a type is declared in.
    pub fn language_of(&self, ty: SymbolId) -> Option<Language> {
        let doc = self.model.type_symbol(ty)?.document?;
        self.document(doc).map(|d| d.language)
    }

    /// A generator for ids not yet used anywhere in the program.
    pub fn id_gen(&self) -> IdGen {
        let last = self
            .documents
            .iter()
            .flat_map(|d| d.bodies.iter())
            .map(|b| b.max_id())
            .max()
            .unwrap_or_default();
        IdGen::after(last)
    }
}

/// Cooperative cancellation, shared between the caller and a running conversion.
#[derive(Clone, Default, Debug)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Where a type is used.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ReferenceLocation {
    pub document: DocumentId,
    /// The member whose body contains the reference.
    pub owner: SymbolId,
    pub op: OpId,
    pub span: Span,
}

/// Finds every place a type is referenced across the whole program.
pub trait ReferenceFinder {
    fn find_references(&self, program: &Program, ty: SymbolId) -> Vec<ReferenceLocation>;
}

/// Scans every body for creations of the type.
#[derive(Copy, Clone, Default, Debug)]
pub struct BodyScan;

impl ReferenceFinder for BodyScan {
    fn find_references(&self, program: &Program, ty: SymbolId) -> Vec<ReferenceLocation> {
        let mut found = Vec::new();
        for doc in &program.documents {
            for body in &doc.bodies {
                for op in body.operations() {
                    if matches!(op.kind, OpKind::ObjectCreation { .. }) && op.ty.is(ty) {
                        found.push(ReferenceLocation {
                            document: doc.id,
                            owner: body.owner,
                            op: op.id,
                            span: op.span,
                        });
                    }
                }
            }
        }
        found
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum BodyEdit {
    Replace(Body),
    Remove,
}

#[derive(Clone, PartialEq, Debug)]
pub struct DocumentEdit {
    pub document: DocumentId,
    /// At most one edit per body owner.
    pub bodies: Vec<(SymbolId, BodyEdit)>,
}

/// A whole-program change, applied atomically by [`ProgramEdit::apply`].
#[derive(Clone, Default, Debug)]
pub struct ProgramEdit {
    pub documents: Vec<DocumentEdit>,
    /// Replacement symbol model, if declarations changed.
    pub model: Option<Model>,
}

impl ProgramEdit {
    pub fn new() -> Self {
        ProgramEdit::default()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.iter().all(|d| d.bodies.is_empty()) && self.model.is_none()
    }

    fn set(&mut self, document: DocumentId, owner: SymbolId, edit: BodyEdit) {
        let pos = match self.documents.iter().position(|d| d.document == document) {
            Some(pos) => pos,
            None => {
                self.documents.push(DocumentEdit {
                    document,
                    bodies: Vec::new(),
                });
                self.documents.len() - 1
            }
        };
        let bodies = &mut self.documents[pos].bodies;
        match bodies.iter_mut().find(|(o, _)| *o == owner) {
            Some(slot) => slot.1 = edit,
            None => bodies.push((owner, edit)),
        }
    }

    /// Replaces a body, superseding any earlier edit of it.
    pub fn replace(&mut self, document: DocumentId, body: Body) {
        self.set(document, body.owner, BodyEdit::Replace(body));
    }

    pub fn remove(&mut self, document: DocumentId, owner: SymbolId) {
        self.set(document, owner, BodyEdit::Remove);
    }

    pub fn edit_of(&self, owner: SymbolId) -> Option<&BodyEdit> {
        self.documents
            .iter()
            .flat_map(|d| d.bodies.iter())
            .find(|(o, _)| *o == owner)
            .map(|(_, e)| e)
    }

    /// A body as it stands with this edit applied: the pending replacement, or the original.
    pub fn current_body<'a>(&'a self, program: &'a Program, owner: SymbolId) -> Option<&'a Body> {
        match self.edit_of(owner) {
            Some(BodyEdit::Replace(body)) => Some(body),
            Some(BodyEdit::Remove) => None,
            None => program.body(owner),
        }
    }

    /// Merges `other` into this edit; `other` wins where both touch a body.
    pub fn extend(&mut self, other: ProgramEdit) {
        for doc in other.documents {
            for (owner, edit) in doc.bodies {
                self.set(doc.document, owner, edit);
            }
        }
        if other.model.is_some() {
            self.model = other.model;
        }
    }

    /// The program with every edit applied. Fails without side effects if any edit refers to a
    /// document or body that does not exist.
    pub fn apply(&self, program: &Program) -> Result<Program> {
        let mut out = program.clone();
        for edit in &self.documents {
            let doc = out
                .document_mut(edit.document)
                .ok_or_else(|| Error::MissingNode(format!("document {:?}", edit.document)))?;
            for (owner, body_edit) in &edit.bodies {
                let pos = doc
                    .bodies
                    .iter()
                    .position(|b| b.owner == *owner)
                    .ok_or_else(|| Error::MissingNode(format!("body of {} in {}", owner, doc.name)))?;
                match body_edit {
                    BodyEdit::Replace(body) => doc.bodies[pos] = body.clone(),
                    BodyEdit::Remove => {
                        doc.bodies.remove(pos);
                    }
                }
            }
        }
        if let Some(model) = &self.model {
            out.model = model.clone();
        }
        Ok(out)
    }
}

/// `null` for nullable types, `default` otherwise.
pub fn fill_value(ids: &mut IdGen, ty: &Type) -> Operation {
    if ty.nullable {
        Operation::literal(ids.next(), Constant::Null, Type::null())
    } else {
        Operation::literal(ids.next(), Constant::Default, ty.clone())
    }
}

/// Rewrites `new T { P = v, ... }` to `new T(v, ...)` following `order`. `None` if the
/// creation does not use the implicit parameterless constructor with an initializer.
pub fn rewrite_creation(
    model: &Model,
    op: &Operation,
    order: &[SymbolId],
    ids: &mut IdGen,
) -> Option<Operation> {
    let entries = match &op.kind {
        OpKind::ObjectCreation {
            constructor: None,
            arguments,
            initializer: Some(entries),
        } if arguments.is_empty() => entries,
        _ => return None,
    };
    let mut arguments: Vec<Option<Operation>> = vec![None; order.len()];
    let mut residual = Vec::new();
    for entry in entries {
        let slot = match &entry.kind {
            OpKind::Assignment { target, value } => match &target.kind {
                OpKind::MemberReference { member, .. } => order
                    .iter()
                    .position(|m| m == member)
                    .filter(|&pos| arguments[pos].is_none())
                    .map(|pos| (pos, value)),
                _ => None,
            },
            _ => None,
        };
        match slot {
            Some((pos, value)) => arguments[pos] = Some((**value).clone()),
            None => residual.push(entry.clone()),
        }
    }
    let arguments = arguments
        .into_iter()
        .zip(order)
        .map(|(arg, &member)| {
            arg.unwrap_or_else(|| {
                let ty = model.value_type(member).cloned().unwrap_or_else(Type::object);
                fill_value(ids, &ty)
            })
        })
        .collect();
    let initializer = if residual.is_empty() { None } else { Some(residual) };
    Some(Operation {
        kind: OpKind::ObjectCreation {
            constructor: None,
            arguments,
            initializer,
        },
        ..op.clone()
    })
}

/// Rewrites every object-initializer creation of `ty` in the program.
///
/// All references are found before anything is rewritten. Within a document, call sites are
/// rewritten smallest first, on a working copy of each body, so a creation nested inside
/// another is rewritten before its container. Documents in a language other than the one `ty`
/// is declared in are skipped. A call site that cannot be rewritten is logged and skipped;
/// cancellation discards everything.
pub fn rewrite_initializers(
    program: &Program,
    ty: SymbolId,
    order: &[SymbolId],
    finder: &dyn ReferenceFinder,
    cancel: &CancellationToken,
    ids: &mut IdGen,
) -> Result<ProgramEdit> {
    let language = program.language_of(ty);
    let mut by_document: BTreeMap<DocumentId, Vec<ReferenceLocation>> = BTreeMap::new();
    for loc in finder.find_references(program, ty) {
        by_document.entry(loc.document).or_default().push(loc);
    }

    let mut edit = ProgramEdit::new();
    for (document, mut locations) in by_document {
        cancel.check()?;
        let doc = match program.document(document) {
            Some(doc) => doc,
            None => {
                warn!("reference in unknown document {:?}", document);
                continue;
            }
        };
        if language.map_or(false, |l| l != doc.language) {
            trace!("{}: different language, skipped", doc.name);
            continue;
        }
        locations.sort_by_key(|l| (l.span.extent(), l.span.start));

        let mut working: HashMap<SymbolId, Body> = HashMap::new();
        for loc in locations {
            cancel.check()?;
            let body = match working.get(&loc.owner).or_else(|| doc.body(loc.owner)) {
                Some(body) => body,
                None => {
                    warn!("{}: no body for {}", doc.name, loc.owner);
                    continue;
                }
            };
            let site = match body.find(loc.op) {
                Some(op) => op,
                None => {
                    warn!("{}: call site {:?} not found", doc.name, loc.op);
                    continue;
                }
            };
            let rewritten = match rewrite_creation(&program.model, site, order, ids) {
                Some(op) => op,
                None => {
                    trace!("{}: {:?} is not an initializer creation", doc.name, loc.op);
                    continue;
                }
            };
            match body.replaced(loc.op, rewritten) {
                Some(body) => {
                    working.insert(loc.owner, body);
                }
                None => warn!("{}: could not replace {:?}", doc.name, loc.op),
            }
        }
        debug!("{}: {} bodies rewritten", doc.name, working.len());
        let mut owners: Vec<_> = working.keys().copied().collect();
        owners.sort();
        for owner in owners {
            if let Some(body) = working.remove(&owner) {
                edit.replace(document, body);
            }
        }
    }
    Ok(edit)
}
