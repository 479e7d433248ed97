use super::*;
use crate::Error;
use crate::storage::Database;
use crate::storage::modules::fetch_or_insert_module;
use crate::storage::records::{self, PropertyRow, TypeRow};
use crate::synchronization::{
    ChangeLevel, EnumerationDeclaration, EnumeratorDeclaration, ExportedType, FileStatus, FileType,
    FunctionDeclaration, Import, ImportedTypeName, ModuleExportedImport, ParameterDeclaration,
    ProjectData, PropertyDeclaration, SignalDeclaration, Type,
};
use crate::traits::{PropertyDeclarationTraits, TypeTraits};
use crate::version::Version;

const BUILTINS: SourceId = SourceId(1);
const QTQML_TYPES: SourceId = SourceId(2);
const QTQUICK_TYPES: SourceId = SourceId(3);
const DOCUMENT: SourceId = SourceId(10);

struct Modules {
    qml: ModuleId,
    qtqml: ModuleId,
    qtquick: ModuleId,
    app: ModuleId,
}

fn setup() -> (Database, Modules) {
    let db = Database::open_in_memory().unwrap();
    let modules = Modules {
        qml: module(&db, "QML"),
        qtqml: module(&db, "QtQml"),
        qtquick: module(&db, "QtQuick"),
        app: module(&db, "App"),
    };
    (db, modules)
}

fn module(db: &Database, name: &str) -> ModuleId {
    db.read(|conn| fetch_or_insert_module(conn, name)).unwrap()
}

fn sync(db: &Database, package: &SynchronizationPackage) -> Result<SynchronizationReport> {
    db.write(|conn| Synchronizer::new(conn).run(package))
}

fn name(name: &str) -> ImportedTypeName {
    ImportedTypeName::unqualified(name)
}

fn type_id(db: &Database, source_id: SourceId, name: &str) -> TypeId {
    db.read(|conn| records::fetch_type_id(conn, source_id, name))
        .unwrap()
        .unwrap_or_else(|| panic!("type {name} missing"))
}

fn type_row(db: &Database, type_id: TypeId) -> TypeRow {
    db.read(|conn| records::fetch_type(conn, type_id)).unwrap().unwrap()
}

fn property(db: &Database, type_id: TypeId, name: &str) -> PropertyRow {
    db.read(|conn| records::fetch_local_property(conn, type_id, name))
        .unwrap()
        .unwrap_or_else(|| panic!("property {name} missing"))
}

fn count(db: &Database, table: &str) -> i64 {
    db.read(|conn| Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?))
        .unwrap()
}

fn builtin_types(m: &Modules) -> Vec<Type> {
    vec![
        Type::new("double", BUILTINS, TypeTraits::VALUE).with_exported_type(ExportedType::new(
            m.qml,
            "double",
            Version::none(),
        )),
        Type::new("string", BUILTINS, TypeTraits::VALUE).with_exported_type(ExportedType::new(
            m.qml,
            "string",
            Version::none(),
        )),
    ]
}

fn qobject(m: &Modules) -> Type {
    Type::new("QObject", QTQML_TYPES, TypeTraits::REFERENCE)
        .with_exported_type(ExportedType::new(m.qtqml, "QtObject", Version::new(2, 0)))
        .with_property(PropertyDeclaration::new(
            "objectName",
            name("string"),
            PropertyDeclarationTraits::empty(),
        ))
}

fn qquick_item(m: &Modules) -> Type {
    Type::new("QQuickItem", QTQUICK_TYPES, TypeTraits::REFERENCE)
        .with_prototype(name("QtObject"))
        .with_exported_type(ExportedType::new(m.qtquick, "Item", Version::new(2, 0)))
        .with_property(PropertyDeclaration::new("width", name("double"), PropertyDeclarationTraits::empty()))
        .with_property(PropertyDeclaration::new(
            "children",
            name("Item"),
            PropertyDeclarationTraits::IS_LIST | PropertyDeclarationTraits::IS_POINTER,
        ))
        .with_default_property("children")
}

fn qquick_text(m: &Modules) -> Type {
    Type::new("QQuickText", QTQUICK_TYPES, TypeTraits::REFERENCE)
        .with_prototype(name("Item"))
        .with_exported_type(ExportedType::new(m.qtquick, "Text", Version::new(2, 0)))
        .with_property(PropertyDeclaration::new("text", name("string"), PropertyDeclarationTraits::empty()))
}

/// Builtins, QtQml and QtQuick as three qmltypes files
fn base_package(m: &Modules) -> SynchronizationPackage {
    let mut types = builtin_types(m);
    types.push(qobject(m));
    types.push(qquick_item(m));
    types.push(qquick_text(m));

    SynchronizationPackage {
        module_dependencies: vec![
            Import::new(m.qml, Version::none(), QTQML_TYPES),
            Import::new(m.qml, Version::none(), QTQUICK_TYPES),
            Import::new(m.qtqml, Version::none(), QTQUICK_TYPES),
            Import::new(m.qtquick, Version::none(), QTQUICK_TYPES),
        ],
        updated_module_dependency_source_ids: vec![QTQML_TYPES, QTQUICK_TYPES],
        ..SynchronizationPackage::with_types(types, vec![BUILTINS, QTQML_TYPES, QTQUICK_TYPES])
    }
}

fn document_imports(m: &Modules) -> Vec<Import> {
    vec![
        Import::new(m.qml, Version::none(), DOCUMENT),
        Import::new(m.qtquick, Version::new(2, 15), DOCUMENT),
        Import::new(m.app, Version::none(), DOCUMENT),
    ]
}

fn document(m: &Modules, doc: Type) -> SynchronizationPackage {
    SynchronizationPackage {
        imports: document_imports(m),
        ..SynchronizationPackage::with_types(vec![doc], vec![DOCUMENT])
    }
}

fn doc_type(m: &Modules) -> Type {
    Type::new("Doc", DOCUMENT, TypeTraits::REFERENCE | TypeTraits::IS_FILE_COMPONENT)
        .with_prototype(name("Item"))
        .with_exported_type(ExportedType::new(m.app, "Doc", Version::none()))
}

#[test]
fn test_base_package_resolves_prototypes_and_property_types() {
    let (db, m) = setup();

    let report = sync(&db, &base_package(&m)).unwrap();
    assert_eq!(report.inserted_types, 5);
    assert_eq!(report.deleted_types, 0);

    let qobject = type_id(&db, QTQML_TYPES, "QObject");
    let item = type_id(&db, QTQUICK_TYPES, "QQuickItem");
    let text = type_id(&db, QTQUICK_TYPES, "QQuickText");
    assert_eq!(type_row(&db, item).prototype_id, Some(qobject));
    assert_eq!(type_row(&db, text).prototype_id, Some(item));
    assert_eq!(type_row(&db, item).default_property_name.as_deref(), Some("children"));

    let width = property(&db, item, "width");
    assert_eq!(width.property_type_id, Some(type_id(&db, BUILTINS, "double")));
    let children = property(&db, item, "children");
    assert_eq!(children.property_type_id, Some(item));
    assert_eq!(
        children.traits,
        PropertyDeclarationTraits::IS_LIST | PropertyDeclarationTraits::IS_POINTER
    );
}

#[test]
fn test_resynchronizing_same_package_changes_nothing() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();
    let types_before = db.read(records::fetch_types).unwrap();
    let item = type_id(&db, QTQUICK_TYPES, "QQuickItem");
    let width_before = property(&db, item, "width");
    let names_before = count(&db, "imported_type_names");

    let report = sync(&db, &base_package(&m)).unwrap();

    assert_eq!(report.inserted_types, 0);
    assert_eq!(report.updated_types, 5);
    assert_eq!(report.deleted_types, 0);
    assert_eq!(report.relinked, 0);
    assert!(report.changed_export_names.is_empty());
    assert_eq!(db.read(records::fetch_types).unwrap(), types_before);
    assert_eq!(property(&db, item, "width"), width_before);
    assert_eq!(count(&db, "imported_type_names"), names_before);
}

#[test]
fn test_member_declarations_are_stored_and_replaced() {
    let (db, m) = setup();
    let mut package = base_package(&m);
    let item = package
        .types
        .iter_mut()
        .find(|ty| ty.type_name == "QQuickItem")
        .unwrap();
    item.function_declarations.push(FunctionDeclaration::new(
        "mapToItem",
        "QPointF",
        vec![ParameterDeclaration::new("item", "QQuickItem"), ParameterDeclaration::new("x", "double")],
    ));
    item.function_declarations.push(FunctionDeclaration::new(
        "mapToItem",
        "QPointF",
        vec![ParameterDeclaration::new("item", "QQuickItem")],
    ));
    item.signal_declarations.push(SignalDeclaration::new("widthChanged", vec![]));
    item.enumeration_declarations.push(EnumerationDeclaration::new(
        "TransformOrigin",
        vec![EnumeratorDeclaration::new("TopLeft"), EnumeratorDeclaration::with_value("Center", 4)],
    ));
    sync(&db, &package).unwrap();

    assert_eq!(count(&db, "function_declarations"), 2);
    assert_eq!(count(&db, "signal_declarations"), 1);
    let enumerators: String = db
        .read(|conn| {
            Ok(conn.query_row(
                "SELECT enumerators FROM enumeration_declarations WHERE name = 'TransformOrigin'",
                [],
                |row| row.get(0),
            )?)
        })
        .unwrap();
    let stored: Vec<EnumeratorDeclaration> = serde_json::from_str(&enumerators).unwrap();
    assert_eq!(stored[1], EnumeratorDeclaration::with_value("Center", 4));

    sync(&db, &base_package(&m)).unwrap();
    assert_eq!(count(&db, "function_declarations"), 0);
    assert_eq!(count(&db, "signal_declarations"), 0);
    assert_eq!(count(&db, "enumeration_declarations"), 0);
}

#[test]
fn test_package_loaded_from_json_synchronizes_like_built_one() {
    let (db, m) = setup();
    let json = serde_json::to_string(&base_package(&m)).unwrap();
    let package: SynchronizationPackage = serde_json::from_str(&json).unwrap();

    let report = sync(&db, &package).unwrap();

    assert_eq!(report.inserted_types, 5);
    assert_eq!(count(&db, "exported_types"), 5);
}

#[test]
fn test_unknown_prototype_name_is_rejected() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();

    let doc = Type::new("Doc", DOCUMENT, TypeTraits::REFERENCE).with_prototype(name("Rectangle"));
    let err = sync(&db, &document(&m, doc)).unwrap_err();

    assert!(matches!(err, Error::TypeNameDoesNotExist { ref name, source_id } if name == "Rectangle" && source_id == DOCUMENT));
    assert_eq!(count(&db, "types"), 5);
}

#[test]
fn test_prototype_cycle_is_rejected() {
    let (db, m) = setup();
    let package = SynchronizationPackage {
        imports: vec![Import::new(m.app, Version::none(), DOCUMENT)],
        ..SynchronizationPackage::with_types(
            vec![
                Type::new("A", DOCUMENT, TypeTraits::REFERENCE)
                    .with_prototype(name("B"))
                    .with_exported_type(ExportedType::new(m.app, "A", Version::none())),
                Type::new("B", DOCUMENT, TypeTraits::REFERENCE)
                    .with_prototype(name("A"))
                    .with_exported_type(ExportedType::new(m.app, "B", Version::none())),
            ],
            vec![DOCUMENT],
        )
    };

    let err = sync(&db, &package).unwrap_err();

    assert!(matches!(err, Error::PrototypeChainCycle));
    assert_eq!(count(&db, "types"), 0);
}

#[test]
fn test_type_that_is_its_own_prototype_is_rejected() {
    let (db, m) = setup();
    let package = SynchronizationPackage {
        imports: vec![Import::new(m.app, Version::none(), DOCUMENT)],
        ..SynchronizationPackage::with_types(
            vec![
                Type::new("Loop", DOCUMENT, TypeTraits::REFERENCE)
                    .with_prototype(name("Loop"))
                    .with_exported_type(ExportedType::new(m.app, "Loop", Version::none())),
            ],
            vec![DOCUMENT],
        )
    };

    assert!(matches!(sync(&db, &package).unwrap_err(), Error::PrototypeChainCycle));
}

#[test]
fn test_cycle_through_extension_is_rejected() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();

    let mut package = base_package(&m);
    let qobject = package.types.iter_mut().find(|ty| ty.type_name == "QObject").unwrap();
    qobject.extension = Some(name("Text"));
    package.module_dependencies.push(Import::new(m.qtquick, Version::none(), QTQML_TYPES));

    assert!(matches!(sync(&db, &package).unwrap_err(), Error::PrototypeChainCycle));
    let qobject = type_id(&db, QTQML_TYPES, "QObject");
    assert_eq!(type_row(&db, qobject).extension_id, None);
}

#[test]
fn test_alias_chain_cycle_is_rejected() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();

    let doc = doc_type(&m)
        .with_property(PropertyDeclaration::alias("first", name("Doc"), "second"))
        .with_property(PropertyDeclaration::alias("second", name("Doc"), "first"));

    assert!(matches!(sync(&db, &document(&m, doc)).unwrap_err(), Error::AliasChainCycle));
    assert_eq!(count(&db, "types"), 5);
}

#[test]
fn test_alias_to_itself_is_rejected() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();

    let doc = doc_type(&m).with_property(PropertyDeclaration::alias("self", name("Doc"), "self"));

    assert!(matches!(sync(&db, &document(&m, doc)).unwrap_err(), Error::AliasChainCycle));
}

fn alias_document(m: &Modules) -> Type {
    doc_type(m)
        .with_property(PropertyDeclaration::alias("items", name("Item"), "children"))
        .with_property(PropertyDeclaration::new("label", name("Text"), PropertyDeclarationTraits::IS_POINTER))
        .with_property(PropertyDeclaration::alias("labelText", name("Doc"), "label").with_alias_tail("text"))
        .with_property(PropertyDeclaration::alias("moreItems", name("Doc"), "items"))
}

#[test]
fn test_aliases_take_type_and_traits_of_their_target() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();

    let report = sync(&db, &document(&m, alias_document(&m))).unwrap();
    assert!(report.resolved_aliases >= 3);

    let doc = type_id(&db, DOCUMENT, "Doc");
    let item = type_id(&db, QTQUICK_TYPES, "QQuickItem");
    let list_pointer = PropertyDeclarationTraits::IS_LIST | PropertyDeclarationTraits::IS_POINTER;

    let items = property(&db, doc, "items");
    assert_eq!(items.property_type_id, Some(item));
    assert_eq!(items.traits, list_pointer);
    assert_eq!(items.alias_type_id, Some(item));
    assert_eq!(items.alias_property_declaration_id, Some(property(&db, item, "children").id));

    let label_text = property(&db, doc, "labelText");
    assert_eq!(label_text.property_type_id, Some(type_id(&db, BUILTINS, "string")));
    assert_eq!(label_text.alias_property_declaration_id, Some(property(&db, doc, "label").id));
    let text = type_id(&db, QTQUICK_TYPES, "QQuickText");
    assert_eq!(label_text.alias_property_declaration_tail_id, Some(property(&db, text, "text").id));

    let more_items = property(&db, doc, "moreItems");
    assert_eq!(more_items.property_type_id, Some(item));
    assert_eq!(more_items.traits, list_pointer);
    assert_eq!(more_items.alias_property_declaration_id, Some(items.id));
}

#[test]
fn test_alias_follows_target_trait_change_through_two_hops() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();
    sync(&db, &document(&m, alias_document(&m))).unwrap();

    let mut package = base_package(&m);
    let item = package.types.iter_mut().find(|ty| ty.type_name == "QQuickItem").unwrap();
    item.property_declarations[1].traits = PropertyDeclarationTraits::IS_LIST | PropertyDeclarationTraits::IS_READ_ONLY;
    sync(&db, &package).unwrap();

    let doc = type_id(&db, DOCUMENT, "Doc");
    let list_read_only = PropertyDeclarationTraits::IS_LIST | PropertyDeclarationTraits::IS_READ_ONLY;
    assert_eq!(property(&db, doc, "items").traits, list_read_only);
    assert_eq!(property(&db, doc, "moreItems").traits, list_read_only);
}

#[test]
fn test_alias_follows_target_type_change() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();
    sync(&db, &document(&m, alias_document(&m))).unwrap();

    let mut package = base_package(&m);
    let text = package.types.iter_mut().find(|ty| ty.type_name == "QQuickText").unwrap();
    text.property_declarations[0].type_name = name("double");
    sync(&db, &package).unwrap();

    let doc = type_id(&db, DOCUMENT, "Doc");
    assert_eq!(
        property(&db, doc, "labelText").property_type_id,
        Some(type_id(&db, BUILTINS, "double"))
    );
}

const LABEL_TYPES: SourceId = SourceId(30);

fn label_package(m: &Modules, label: Type) -> SynchronizationPackage {
    SynchronizationPackage {
        imports: vec![
            Import::new(m.qml, Version::none(), LABEL_TYPES),
            Import::new(m.qtquick, Version::none(), LABEL_TYPES),
        ],
        ..SynchronizationPackage::with_types(vec![label], vec![LABEL_TYPES])
    }
}

fn label_type(m: &Modules) -> Type {
    Type::new("Label", LABEL_TYPES, TypeTraits::REFERENCE)
        .with_prototype(name("Item"))
        .with_exported_type(ExportedType::new(m.app, "Label", Version::none()))
}

#[test]
fn test_alias_tail_moves_to_property_added_on_stem_type() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();
    sync(&db, &label_package(&m, label_type(&m))).unwrap();
    let doc = doc_type(&m)
        .with_property(PropertyDeclaration::new("label", name("Label"), PropertyDeclarationTraits::IS_POINTER))
        .with_property(PropertyDeclaration::alias("labelWidth", name("Doc"), "label").with_alias_tail("width"));
    sync(&db, &document(&m, doc)).unwrap();

    let doc = type_id(&db, DOCUMENT, "Doc");
    let item = type_id(&db, QTQUICK_TYPES, "QQuickItem");
    let label_width = property(&db, doc, "labelWidth");
    assert_eq!(label_width.property_type_id, Some(type_id(&db, BUILTINS, "double")));
    assert_eq!(label_width.alias_property_declaration_tail_id, Some(property(&db, item, "width").id));

    let shadowing = label_type(&m).with_property(PropertyDeclaration::new(
        "width",
        name("string"),
        PropertyDeclarationTraits::IS_READ_ONLY,
    ));
    sync(&db, &label_package(&m, shadowing)).unwrap();

    let label = type_id(&db, LABEL_TYPES, "Label");
    let label_width = property(&db, doc, "labelWidth");
    assert_eq!(label_width.property_type_id, Some(type_id(&db, BUILTINS, "string")));
    assert_eq!(label_width.traits, PropertyDeclarationTraits::IS_READ_ONLY);
    assert_eq!(label_width.alias_property_declaration_tail_id, Some(property(&db, label, "width").id));
}

#[test]
fn test_removing_type_owning_alias_target_is_rejected() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();
    let captioned = label_type(&m).with_property(PropertyDeclaration::new(
        "caption",
        name("string"),
        PropertyDeclarationTraits::empty(),
    ));
    sync(&db, &label_package(&m, captioned)).unwrap();
    let doc = doc_type(&m)
        .with_property(PropertyDeclaration::new("label", name("Label"), PropertyDeclarationTraits::IS_POINTER))
        .with_property(PropertyDeclaration::alias("labelCaption", name("Doc"), "label").with_alias_tail("caption"));
    sync(&db, &document(&m, doc)).unwrap();
    let label = type_id(&db, LABEL_TYPES, "Label");
    let caption = property(&db, label, "caption");
    let types_before = count(&db, "types");

    let replacement = Type::new("PlainLabel", LABEL_TYPES, TypeTraits::REFERENCE)
        .with_prototype(name("Item"))
        .with_exported_type(ExportedType::new(m.app, "Label", Version::none()));
    let err = sync(&db, &label_package(&m, replacement)).unwrap_err();

    assert!(matches!(err, Error::ConstraintPreventsModification(_)));
    assert_eq!(count(&db, "types"), types_before);
    assert_eq!(type_id(&db, LABEL_TYPES, "Label"), label);
    let doc = type_id(&db, DOCUMENT, "Doc");
    assert_eq!(property(&db, doc, "labelCaption").alias_property_declaration_tail_id, Some(caption.id));
}

#[test]
fn test_alias_to_unknown_property_is_rejected() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();

    let doc = doc_type(&m).with_property(PropertyDeclaration::alias("missing", name("Item"), "height"));

    let err = sync(&db, &document(&m, doc)).unwrap_err();
    assert!(matches!(err, Error::PropertyNameDoesNotExist(ref name) if name == "height"));
}

#[test]
fn test_removing_aliased_property_of_other_source_is_rejected() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();
    let doc = doc_type(&m).with_property(PropertyDeclaration::alias("itemWidth", name("Item"), "width"));
    sync(&db, &document(&m, doc)).unwrap();

    let mut package = base_package(&m);
    let item = package.types.iter_mut().find(|ty| ty.type_name == "QQuickItem").unwrap();
    item.property_declarations.retain(|property| property.name != "width");

    let err = sync(&db, &package).unwrap_err();
    assert!(matches!(err, Error::ConstraintPreventsModification(_)));
    let item = type_id(&db, QTQUICK_TYPES, "QQuickItem");
    property(&db, item, "width");
}

#[test]
fn test_removing_type_still_used_as_prototype_is_rejected() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();

    let package = SynchronizationPackage::with_types(vec![], vec![QTQML_TYPES]);
    let err = sync(&db, &package).unwrap_err();

    assert!(matches!(err, Error::ConstraintPreventsModification(_)));
    assert_eq!(count(&db, "types"), 5);
    assert_eq!(count(&db, "exported_types"), 5);
}

#[test]
fn test_removing_unreferenced_type_deletes_it_and_its_members() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();
    let doc = doc_type(&m).with_property(PropertyDeclaration::new("count", name("double"), PropertyDeclarationTraits::empty()));
    sync(&db, &document(&m, doc)).unwrap();
    let properties_before = count(&db, "property_declarations");

    let report = sync(&db, &SynchronizationPackage::with_types(vec![], vec![DOCUMENT])).unwrap();

    assert_eq!(report.deleted_types, 1);
    assert_eq!(report.changed_export_names, vec!["Doc".to_string()]);
    assert_eq!(count(&db, "types"), 5);
    assert_eq!(count(&db, "property_declarations"), properties_before - 1);
}

#[test]
fn test_unused_imported_type_names_are_deleted() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();
    let names_without_doc = count(&db, "imported_type_names");

    let doc = doc_type(&m)
        .with_property(PropertyDeclaration::new("count", name("double"), PropertyDeclarationTraits::empty()))
        .with_property(PropertyDeclaration::new("title", name("string"), PropertyDeclarationTraits::empty()));
    sync(&db, &document(&m, doc)).unwrap();
    assert_eq!(count(&db, "imported_type_names"), names_without_doc + 3);

    let doc = doc_type(&m).with_property(PropertyDeclaration::new(
        "count",
        name("double"),
        PropertyDeclarationTraits::empty(),
    ));
    sync(&db, &document(&m, doc)).unwrap();
    assert_eq!(count(&db, "imported_type_names"), names_without_doc + 2);

    sync(&db, &SynchronizationPackage::with_types(vec![], vec![DOCUMENT])).unwrap();
    assert_eq!(count(&db, "imported_type_names"), names_without_doc);
}

#[test]
fn test_moving_export_to_new_type_relinks_dependents() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();

    let replacement = Type::new("QObjectV2", QTQML_TYPES, TypeTraits::REFERENCE)
        .with_exported_type(ExportedType::new(m.qtqml, "QtObject", Version::new(2, 0)));
    let report = sync(&db, &SynchronizationPackage::with_types(vec![replacement], vec![QTQML_TYPES])).unwrap();

    assert_eq!(report.inserted_types, 1);
    assert_eq!(report.deleted_types, 1);
    assert_eq!(report.relinked, 1);
    let replacement = type_id(&db, QTQML_TYPES, "QObjectV2");
    let item = type_id(&db, QTQUICK_TYPES, "QQuickItem");
    assert_eq!(type_row(&db, item).prototype_id, Some(replacement));
}

#[test]
fn test_moving_export_relinks_property_types_of_untouched_sources() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();
    let item = type_id(&db, QTQUICK_TYPES, "QQuickItem");
    let double = type_id(&db, BUILTINS, "double");
    assert_eq!(property(&db, item, "width").property_type_id, Some(double));

    let mut builtins = builtin_types(&m);
    builtins[0] = Type::new("qreal", BUILTINS, TypeTraits::VALUE).with_exported_type(ExportedType::new(
        m.qml,
        "double",
        Version::none(),
    ));
    let report = sync(&db, &SynchronizationPackage::with_types(builtins, vec![BUILTINS])).unwrap();

    assert_eq!(report.deleted_types, 1);
    assert!(report.relinked >= 1);
    let qreal = type_id(&db, BUILTINS, "qreal");
    assert_ne!(qreal, double);
    assert_eq!(property(&db, item, "width").property_type_id, Some(qreal));
}

#[test]
fn test_newer_export_relinks_unversioned_references() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();

    let newer = Type::new("QObjectNext", SourceId(4), TypeTraits::REFERENCE)
        .with_exported_type(ExportedType::new(m.qtqml, "QtObject", Version::new(6, 0)));
    sync(&db, &SynchronizationPackage::with_types(vec![newer], vec![SourceId(4)])).unwrap();

    let item = type_id(&db, QTQUICK_TYPES, "QQuickItem");
    assert_eq!(type_row(&db, item).prototype_id, Some(type_id(&db, SourceId(4), "QObjectNext")));
}

#[test]
fn test_import_version_picks_highest_export_not_above_request() {
    let (db, _) = setup();
    let versioned = module(&db, "Versioned");
    let exports = [(1, 0), (1, 2), (2, 0), (2, 11), (3, 4)];
    let library = SourceId(20);
    let mut types: Vec<Type> = exports
        .iter()
        .map(|&(major, minor)| {
            Type::new(format!("Thing{major}_{minor}"), library, TypeTraits::REFERENCE)
                .with_exported_type(ExportedType::new(versioned, "Thing", Version::new(major, minor)))
        })
        .collect();

    let requests = [
        (SourceId(21), Version::major(2), "Thing2_11"),
        (SourceId(22), Version::new(2, 5), "Thing2_0"),
        (SourceId(23), Version::new(1, 1), "Thing1_0"),
        (SourceId(24), Version::none(), "Thing3_4"),
        (SourceId(25), Version::new(1, 2), "Thing1_2"),
    ];
    let mut imports = Vec::new();
    let mut updated = vec![library];
    for (source_id, version, _) in requests {
        imports.push(Import::new(versioned, version, source_id));
        types.push(Type::new("User", source_id, TypeTraits::REFERENCE).with_prototype(name("Thing")));
        updated.push(source_id);
    }
    sync(
        &db,
        &SynchronizationPackage {
            imports,
            ..SynchronizationPackage::with_types(types, updated)
        },
    )
    .unwrap();

    for (source_id, version, expected) in requests {
        let user = type_id(&db, source_id, "User");
        assert_eq!(
            type_row(&db, user).prototype_id,
            Some(type_id(&db, library, expected)),
            "import version {version}"
        );
    }

    let unmatched = SynchronizationPackage {
        imports: vec![Import::new(versioned, Version::major(4), SourceId(26))],
        ..SynchronizationPackage::with_types(
            vec![Type::new("User", SourceId(26), TypeTraits::REFERENCE).with_prototype(name("Thing"))],
            vec![SourceId(26)],
        )
    };
    assert!(matches!(sync(&db, &unmatched).unwrap_err(), Error::TypeNameDoesNotExist { .. }));
}

#[test]
fn test_minimal_change_level_keeps_members() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();

    let minimal = Type::new("QQuickItem", QTQUICK_TYPES, TypeTraits::REFERENCE | TypeTraits::USES_CUSTOM_PARSER)
        .with_change_level(ChangeLevel::Minimal)
        .with_exported_type(ExportedType::new(m.qtquick, "Item", Version::new(2, 0)))
        .with_exported_type(ExportedType::new(m.qtquick, "Item", Version::new(2, 1)));
    sync(&db, &SynchronizationPackage::with_types(vec![minimal], vec![])).unwrap();

    let item = type_id(&db, QTQUICK_TYPES, "QQuickItem");
    let row = type_row(&db, item);
    assert!(row.traits.contains(TypeTraits::USES_CUSTOM_PARSER));
    assert_eq!(row.default_property_name.as_deref(), Some("children"));
    assert!(row.prototype_id.is_some());
    assert_eq!(db.read(|conn| records::fetch_properties_of(conn, item)).unwrap().len(), 2);
    assert_eq!(db.read(|conn| records::fetch_exported_types_of(conn, item)).unwrap().len(), 2);
}

#[test]
fn test_exclude_exported_types_change_level_keeps_exports() {
    let (db, m) = setup();
    sync(&db, &base_package(&m)).unwrap();

    let partial = Type::new("QQuickItem", QTQUICK_TYPES, TypeTraits::REFERENCE)
        .with_change_level(ChangeLevel::ExcludeExportedTypes)
        .with_prototype(name("QtObject"))
        .with_property(PropertyDeclaration::new("width", name("double"), PropertyDeclarationTraits::empty()));
    sync(&db, &SynchronizationPackage::with_types(vec![partial], vec![])).unwrap();

    let item = type_id(&db, QTQUICK_TYPES, "QQuickItem");
    let properties = db.read(|conn| records::fetch_properties_of(conn, item)).unwrap();
    assert_eq!(properties.len(), 1);
    assert_eq!(properties[0].name, "width");
    let exports = db.read(|conn| records::fetch_exported_types_of(conn, item)).unwrap();
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].name, "Item");
    assert_eq!(type_row(&db, item).default_property_name, None);
}

#[test]
fn test_auto_version_reexport_uses_importer_version() {
    let (db, m) = setup();
    let mut package = base_package(&m);
    package.module_exported_imports = vec![ModuleExportedImport::new(m.qtquick, m.qtqml, Version::none(), true)];
    package.updated_module_ids = vec![m.qtquick];
    sync(&db, &package).unwrap();

    let doc = Type::new("Doc", DOCUMENT, TypeTraits::REFERENCE).with_prototype(name("QtObject"));
    sync(&db, &document(&m, doc)).unwrap();

    let doc = type_id(&db, DOCUMENT, "Doc");
    assert_eq!(type_row(&db, doc).prototype_id, Some(type_id(&db, QTQML_TYPES, "QObject")));
}

#[test]
fn test_fixed_version_reexport_hides_other_majors() {
    let (db, m) = setup();
    let mut package = base_package(&m);
    package.module_exported_imports = vec![ModuleExportedImport::new(m.qtquick, m.qtqml, Version::major(6), false)];
    package.updated_module_ids = vec![m.qtquick];
    sync(&db, &package).unwrap();

    let doc = Type::new("Doc", DOCUMENT, TypeTraits::REFERENCE).with_prototype(name("QtObject"));
    let err = sync(&db, &document(&m, doc)).unwrap_err();
    assert!(matches!(err, Error::TypeNameDoesNotExist { .. }));
}

#[test]
fn test_dropping_reexport_relinks_importers() {
    let (db, m) = setup();
    let mut package = base_package(&m);
    package.module_exported_imports = vec![ModuleExportedImport::new(m.qtquick, m.qtqml, Version::none(), true)];
    package.updated_module_ids = vec![m.qtquick];
    sync(&db, &package).unwrap();
    let doc = Type::new("Doc", DOCUMENT, TypeTraits::REFERENCE).with_prototype(name("QtObject"));
    sync(&db, &document(&m, doc)).unwrap();

    let dropped = SynchronizationPackage {
        updated_module_ids: vec![m.qtquick],
        ..SynchronizationPackage::new()
    };
    let err = sync(&db, &dropped).unwrap_err();

    assert!(matches!(err, Error::TypeNameDoesNotExist { ref name, .. } if name == "QtObject"));
    assert_eq!(count(&db, "module_exported_imports"), 1);
}

#[test]
fn test_qualified_name_uses_only_its_import() {
    let (db, _) = setup();
    let controls = module(&db, "Controls");
    let templates = module(&db, "Templates");
    let types = vec![
        Type::new("ControlsButton", SourceId(40), TypeTraits::REFERENCE)
            .with_exported_type(ExportedType::new(controls, "Button", Version::none())),
        Type::new("TemplatesButton", SourceId(41), TypeTraits::REFERENCE)
            .with_exported_type(ExportedType::new(templates, "Button", Version::none())),
        Type::new("Plain", DOCUMENT, TypeTraits::REFERENCE).with_prototype(name("Button")),
        Type::new("Pinned", DOCUMENT, TypeTraits::REFERENCE).with_prototype(ImportedTypeName::qualified(
            "Button",
            Import::new(templates, Version::none(), DOCUMENT),
        )),
    ];
    let package = SynchronizationPackage {
        imports: vec![
            Import::new(controls, Version::none(), DOCUMENT),
            Import::new(templates, Version::none(), DOCUMENT),
        ],
        ..SynchronizationPackage::with_types(types, vec![SourceId(40), SourceId(41), DOCUMENT])
    };
    sync(&db, &package).unwrap();

    let plain = type_id(&db, DOCUMENT, "Plain");
    let pinned = type_id(&db, DOCUMENT, "Pinned");
    assert_eq!(type_row(&db, plain).prototype_id, Some(type_id(&db, SourceId(40), "ControlsButton")));
    assert_eq!(type_row(&db, pinned).prototype_id, Some(type_id(&db, SourceId(41), "TemplatesButton")));
}

#[test]
fn test_changed_imports_relink_stored_types() {
    let (db, _) = setup();
    let controls = module(&db, "Controls");
    let templates = module(&db, "Templates");
    let library = SynchronizationPackage::with_types(
        vec![
            Type::new("ControlsButton", SourceId(40), TypeTraits::REFERENCE)
                .with_exported_type(ExportedType::new(controls, "Button", Version::none())),
            Type::new("TemplatesButton", SourceId(41), TypeTraits::REFERENCE)
                .with_exported_type(ExportedType::new(templates, "Button", Version::none())),
        ],
        vec![SourceId(40), SourceId(41)],
    );
    sync(&db, &library).unwrap();
    let user = SynchronizationPackage {
        imports: vec![Import::new(controls, Version::none(), DOCUMENT)],
        ..SynchronizationPackage::with_types(
            vec![Type::new("User", DOCUMENT, TypeTraits::REFERENCE).with_prototype(name("Button"))],
            vec![DOCUMENT],
        )
    };
    sync(&db, &user).unwrap();

    let switched = SynchronizationPackage {
        imports: vec![Import::new(templates, Version::none(), DOCUMENT)],
        ..SynchronizationPackage::new()
    };
    let report = sync(&db, &switched).unwrap();

    assert_eq!(report.relinked, 1);
    let user = type_id(&db, DOCUMENT, "User");
    assert_eq!(type_row(&db, user).prototype_id, Some(type_id(&db, SourceId(41), "TemplatesButton")));
}

#[test]
fn test_exported_type_with_unknown_module_is_rejected() {
    let (db, _) = setup();
    let ty = Type::new("Orphan", DOCUMENT, TypeTraits::REFERENCE)
        .with_exported_type(ExportedType::new(ModuleId(999), "Orphan", Version::none()));

    let err = sync(&db, &SynchronizationPackage::with_types(vec![ty], vec![DOCUMENT])).unwrap_err();
    assert!(matches!(err, Error::ExportedTypeCannotBeInserted(ref name) if name == "Orphan"));
}

#[test]
fn test_export_claimed_by_two_types_is_rejected() {
    let (db, m) = setup();
    let types = vec![
        Type::new("First", DOCUMENT, TypeTraits::REFERENCE)
            .with_exported_type(ExportedType::new(m.app, "Same", Version::none())),
        Type::new("Second", DOCUMENT, TypeTraits::REFERENCE)
            .with_exported_type(ExportedType::new(m.app, "Same", Version::none())),
    ];

    let err = sync(&db, &SynchronizationPackage::with_types(types, vec![DOCUMENT])).unwrap_err();
    assert!(matches!(err, Error::ExportedTypeCannotBeInserted(_)));
}

#[test]
fn test_import_of_unknown_module_is_rejected() {
    let (db, _) = setup();
    let package = SynchronizationPackage {
        imports: vec![Import::new(ModuleId(999), Version::none(), DOCUMENT)],
        ..SynchronizationPackage::new()
    };

    assert!(matches!(sync(&db, &package).unwrap_err(), Error::ModuleDoesNotExist(ModuleId(999))));
}

#[test]
fn test_null_identifiers_are_rejected() {
    let (db, m) = setup();

    let ty = Type::new("Broken", SourceId::null(), TypeTraits::REFERENCE);
    let err = sync(&db, &SynchronizationPackage::with_types(vec![ty], vec![])).unwrap_err();
    assert!(matches!(err, Error::TypeHasInvalidSourceId(ref name) if name == "Broken"));

    let package = SynchronizationPackage {
        file_statuses: vec![FileStatus::new(SourceId::null(), 1, 1)],
        ..SynchronizationPackage::new()
    };
    assert!(matches!(sync(&db, &package).unwrap_err(), Error::FileStatusHasInvalidSourceId));

    let project_data = |project: SourceId, source: SourceId, module: ModuleId| SynchronizationPackage {
        project_datas: vec![ProjectData::new(project, source, module, FileType::QmlDocument)],
        ..SynchronizationPackage::new()
    };
    assert!(matches!(
        sync(&db, &project_data(SourceId::null(), DOCUMENT, m.app)).unwrap_err(),
        Error::ProjectDataHasInvalidProjectSourceId
    ));
    assert!(matches!(
        sync(&db, &project_data(SourceId(100), SourceId::null(), m.app)).unwrap_err(),
        Error::ProjectDataHasInvalidSourceId
    ));
    assert!(matches!(
        sync(&db, &project_data(SourceId(100), DOCUMENT, ModuleId::null())).unwrap_err(),
        Error::ProjectDataHasInvalidModuleId
    ));
}

#[test]
fn test_file_statuses_are_replaced_per_updated_source() {
    let (db, _) = setup();
    let first = SynchronizationPackage {
        file_statuses: vec![FileStatus::new(BUILTINS, 10, 100), FileStatus::new(QTQML_TYPES, 20, 200)],
        ..SynchronizationPackage::new()
    };
    sync(&db, &first).unwrap();
    assert_eq!(count(&db, "file_statuses"), 2);

    let second = SynchronizationPackage {
        file_statuses: vec![FileStatus::new(BUILTINS, 11, 101)],
        updated_file_status_source_ids: vec![BUILTINS, QTQML_TYPES],
        ..SynchronizationPackage::new()
    };
    sync(&db, &second).unwrap();

    let (size, modified): (i64, i64) = db
        .read(|conn| {
            Ok(conn.query_row(
                "SELECT size, last_modified FROM file_statuses WHERE source_id = ?1",
                [BUILTINS],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?)
        })
        .unwrap();
    assert_eq!((size, modified), (11, 101));
    assert_eq!(count(&db, "file_statuses"), 1);
}

#[test]
fn test_project_datas_are_replaced_per_updated_project() {
    let (db, m) = setup();
    let project = SourceId(100);
    let first = SynchronizationPackage {
        project_datas: vec![
            ProjectData::new(project, QTQML_TYPES, m.qtqml, FileType::QmlTypes),
            ProjectData::new(project, DOCUMENT, m.app, FileType::QmlDocument),
        ],
        updated_project_source_ids: vec![project],
        ..SynchronizationPackage::new()
    };
    sync(&db, &first).unwrap();
    assert_eq!(count(&db, "project_datas"), 2);

    let second = SynchronizationPackage {
        project_datas: vec![ProjectData::new(project, DOCUMENT, m.qtquick, FileType::QmlDocument)],
        updated_project_source_ids: vec![project],
        ..SynchronizationPackage::new()
    };
    sync(&db, &second).unwrap();

    let module_id: ModuleId = db
        .read(|conn| {
            Ok(conn.query_row(
                "SELECT module_id FROM project_datas WHERE project_source_id = ?1",
                [project],
                |row| row.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(module_id, m.qtquick);
    assert_eq!(count(&db, "project_datas"), 1);
}
